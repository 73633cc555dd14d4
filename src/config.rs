use crate::error::{Error, Result};
use crate::token::TokenizerKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

const DEFAULT_COMPRESS_THRESHOLD_LINES: usize = 200;

/// Directory and file names excluded as literal path segments.
pub(crate) const DEFAULT_IGNORE_SEGMENTS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    "venv",
    ".venv",
    "env",
    "target",
    "dist",
    "build",
    ".idea",
    ".vscode",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".tox",
    ".eggs",
    ".DS_Store",
];

/// Ignore rules applied as regular expressions against the relative path.
pub(crate) const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    r"\.pyc$",
    r"\.pyo$",
    r"\.pyd$",
    r"\.egg-info",
    r"\.coverage",
    r"\.swp$",
    r"\.swo$",
    r"~$",
    r"\.min\.js$",
    r"\.min\.css$",
];

/// Filenames that are admitted even when an ignore rule matches, and that
/// receive the importance bonus during prioritization.
pub(crate) const DEFAULT_IMPORTANT_FILES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "setup.py",
    "setup.cfg",
    "requirements.txt",
    "requirements-dev.txt",
    "Makefile",
    "Dockerfile",
    "docker-compose.yml",
    "README.md",
    "README.rst",
    "README.txt",
    "LICENSE",
    "CHANGELOG.md",
    "main.py",
    "app.py",
    "run.py",
    "manage.py",
    "__init__.py",
    "main.rs",
    "lib.rs",
    "index.js",
    "index.ts",
    "config.py",
    "settings.py",
    "config.yaml",
    "config.yml",
    ".env.example",
];

/// Additive weights for the importance score.
///
/// Every term of the score is independently tunable; the defaults keep the
/// important-file bonus dominant so manifests and entry points always sort
/// ahead of ordinary source files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Bonus for a filename in the important-files set
    pub important_bonus: i64,

    /// Bonus for a primary-source extension
    pub primary_ext_bonus: i64,

    /// Per-level bonus for shallow paths, applied as
    /// `depth_step * (depth_cap - depth)` when `depth < depth_cap`
    pub depth_step: i64,

    /// Depth at which the shallowness bonus bottoms out
    pub depth_cap: usize,

    /// Line count above which the size penalty starts
    pub line_soft_threshold: usize,

    /// Lines of excess per penalty point
    pub line_penalty_divisor: usize,

    /// Penalty for paths with a `test`/`tests` segment
    pub test_path_penalty: i64,

    /// Penalty for paths with an `example`/`examples`/`demo` segment
    pub example_path_penalty: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            important_bonus: 1000,
            primary_ext_bonus: 250,
            depth_step: 25,
            depth_cap: 8,
            line_soft_threshold: 400,
            line_penalty_divisor: 25,
            test_path_penalty: 150,
            example_path_penalty: 75,
        }
    }
}

/// Configuration for the repomap pipeline.
///
/// A single immutable value constructed once (use [`Config::builder()`]) and
/// passed explicitly into every component; no component reads ambient state.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to scan for files
    pub root_dir: PathBuf,

    /// Output file for the rendered digest; `None` writes to stdout
    pub output_path: Option<PathBuf>,

    /// Ignore rules as regular expressions over the POSIX relative path
    pub ignore_patterns: Vec<String>,

    /// Ignore rules as literal path-segment names
    pub ignore_segments: Vec<String>,

    /// Ignore rules as glob patterns over the relative path
    pub exclude_globs: Vec<String>,

    /// Filenames admitted despite ignore rules and boosted in priority
    pub important_files: HashSet<String>,

    /// Admit binary files instead of skipping them
    pub include_binary: bool,

    /// Honor `.gitignore` rules of the scanned tree
    pub respect_gitignore: bool,

    /// Follow symbolic links during traversal
    pub follow_symlinks: bool,

    /// Token budget for the whole run; `None` is unbounded
    pub max_tokens: Option<usize>,

    /// File-count budget for the whole run; `None` is unbounded
    pub max_files: Option<usize>,

    /// Files larger than this many bytes are skipped outright
    pub max_file_size_bytes: Option<u64>,

    /// Per-file line ceiling after any transformation
    pub max_lines_per_file: Option<usize>,

    /// Compress files that exceed the threshold instead of truncating
    pub compress_large_files: bool,

    /// Line count above which compression triggers
    pub compress_threshold_lines: usize,

    /// Strip comments during compression
    pub strip_comments: bool,

    /// Token estimator used for budget accounting
    pub tokenizer: TokenizerKind,

    /// Importance score weights
    pub score_weights: ScoreWeights,

    /// Render the tree view of selected files
    pub include_structure: bool,

    /// Render the extracted dependency list
    pub include_dependencies: bool,

    /// Render the LLM instruction header
    pub include_instructions: bool,

    /// Back up an existing output file before overwriting it
    pub backup_existing: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use repomap::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .max_tokens(50_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - A budget ceiling is zero
    /// - An ignore regex or exclude glob fails to compile
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.compress_threshold_lines == 0 {
            return Err(Error::config(
                "compress_threshold_lines must be greater than 0",
            ));
        }

        for (name, ceiling) in [
            ("max_tokens", self.max_tokens),
            ("max_files", self.max_files),
            ("max_lines_per_file", self.max_lines_per_file),
        ] {
            if ceiling == Some(0) {
                return Err(Error::config(format!(
                    "{name} must be greater than 0 when set (omit it for unbounded)"
                )));
            }
        }

        if self.max_file_size_bytes == Some(0) {
            return Err(Error::config(
                "max_file_size_bytes must be greater than 0 when set (omit it for unbounded)",
            ));
        }

        for pattern in &self.ignore_patterns {
            regex::Regex::new(pattern)
                .map_err(|e| Error::pattern(pattern.clone(), e.to_string()))?;
        }

        for pattern in &self.exclude_globs {
            globset::Glob::new(pattern)
                .map_err(|e| Error::pattern(pattern.clone(), e.to_string()))?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_path: None,
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            ignore_segments: DEFAULT_IGNORE_SEGMENTS
                .iter()
                .map(ToString::to_string)
                .collect(),
            exclude_globs: Vec::new(),
            important_files: DEFAULT_IMPORTANT_FILES
                .iter()
                .map(ToString::to_string)
                .collect(),
            include_binary: false,
            respect_gitignore: true,
            follow_symlinks: false,
            max_tokens: None,
            max_files: None,
            max_file_size_bytes: None,
            max_lines_per_file: None,
            compress_large_files: true,
            compress_threshold_lines: DEFAULT_COMPRESS_THRESHOLD_LINES,
            strip_comments: false,
            tokenizer: TokenizerKind::default(),
            score_weights: ScoreWeights::default(),
            include_structure: true,
            include_dependencies: true,
            include_instructions: true,
            backup_existing: true,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_path: Option<PathBuf>,
    ignore_patterns: Option<Vec<String>>,
    extra_ignore_patterns: Vec<String>,
    ignore_segments: Option<Vec<String>>,
    exclude_globs: Vec<String>,
    important_files: Option<Vec<String>>,
    extra_important_files: Vec<String>,
    include_binary: bool,
    respect_gitignore: Option<bool>,
    follow_symlinks: bool,
    max_tokens: Option<usize>,
    max_files: Option<usize>,
    max_file_size_bytes: Option<u64>,
    max_lines_per_file: Option<usize>,
    compress_large_files: Option<bool>,
    compress_threshold_lines: Option<usize>,
    strip_comments: bool,
    tokenizer: Option<TokenizerKind>,
    score_weights: Option<ScoreWeights>,
    include_structure: Option<bool>,
    include_dependencies: Option<bool>,
    include_instructions: Option<bool>,
    backup_existing: Option<bool>,
}

impl ConfigBuilder {
    /// Sets the root directory to scan.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output file path (stdout when unset).
    #[must_use]
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Replaces the default ignore regexes.
    #[must_use]
    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = Some(patterns);
        self
    }

    /// Adds ignore regexes on top of the defaults.
    #[must_use]
    pub fn extra_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.extra_ignore_patterns = patterns;
        self
    }

    /// Replaces the default ignored path segments.
    #[must_use]
    pub fn ignore_segments(mut self, segments: Vec<String>) -> Self {
        self.ignore_segments = Some(segments);
        self
    }

    /// Sets glob patterns excluded from the scan.
    #[must_use]
    pub fn exclude_globs(mut self, globs: Vec<String>) -> Self {
        self.exclude_globs = globs;
        self
    }

    /// Replaces the default important-files set.
    #[must_use]
    pub fn important_files(mut self, files: Vec<String>) -> Self {
        self.important_files = Some(files);
        self
    }

    /// Adds important filenames on top of the defaults.
    #[must_use]
    pub fn extra_important_files(mut self, files: Vec<String>) -> Self {
        self.extra_important_files = files;
        self
    }

    /// Enables or disables binary file inclusion.
    #[must_use]
    pub fn include_binary(mut self, enabled: bool) -> Self {
        self.include_binary = enabled;
        self
    }

    /// Enables or disables `.gitignore` handling.
    #[must_use]
    pub fn respect_gitignore(mut self, enabled: bool) -> Self {
        self.respect_gitignore = Some(enabled);
        self
    }

    /// Enables or disables following symbolic links.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.follow_symlinks = enabled;
        self
    }

    /// Sets the run-wide token budget.
    #[must_use]
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the run-wide file-count budget.
    #[must_use]
    pub fn max_files(mut self, files: usize) -> Self {
        self.max_files = Some(files);
        self
    }

    /// Sets the oversize cutoff in bytes.
    #[must_use]
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = Some(bytes);
        self
    }

    /// Sets the per-file line ceiling.
    #[must_use]
    pub fn max_lines_per_file(mut self, lines: usize) -> Self {
        self.max_lines_per_file = Some(lines);
        self
    }

    /// Enables or disables compression of oversized files.
    #[must_use]
    pub fn compress_large_files(mut self, enabled: bool) -> Self {
        self.compress_large_files = Some(enabled);
        self
    }

    /// Sets the line count above which compression triggers.
    #[must_use]
    pub fn compress_threshold_lines(mut self, lines: usize) -> Self {
        self.compress_threshold_lines = Some(lines);
        self
    }

    /// Enables or disables comment stripping during compression.
    #[must_use]
    pub fn strip_comments(mut self, enabled: bool) -> Self {
        self.strip_comments = enabled;
        self
    }

    /// Sets the token estimator.
    #[must_use]
    pub fn tokenizer(mut self, kind: TokenizerKind) -> Self {
        self.tokenizer = Some(kind);
        self
    }

    /// Sets the importance score weights.
    #[must_use]
    pub fn score_weights(mut self, weights: ScoreWeights) -> Self {
        self.score_weights = Some(weights);
        self
    }

    /// Enables or disables the tree view section.
    #[must_use]
    pub fn include_structure(mut self, enabled: bool) -> Self {
        self.include_structure = Some(enabled);
        self
    }

    /// Enables or disables the dependency section.
    #[must_use]
    pub fn include_dependencies(mut self, enabled: bool) -> Self {
        self.include_dependencies = Some(enabled);
        self
    }

    /// Enables or disables the instruction header.
    #[must_use]
    pub fn include_instructions(mut self, enabled: bool) -> Self {
        self.include_instructions = Some(enabled);
        self
    }

    /// Enables or disables backup creation for an existing output file.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = Some(enabled);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();

        let mut ignore_patterns = self
            .ignore_patterns
            .unwrap_or(defaults.ignore_patterns);
        ignore_patterns.extend(self.extra_ignore_patterns);

        let mut important_files: HashSet<String> = match self.important_files {
            Some(files) => files.into_iter().collect(),
            None => defaults.important_files,
        };
        important_files.extend(self.extra_important_files);

        let config = Config {
            root_dir: self.root_dir.unwrap_or(defaults.root_dir),
            output_path: self.output_path,
            ignore_patterns,
            ignore_segments: self.ignore_segments.unwrap_or(defaults.ignore_segments),
            exclude_globs: self.exclude_globs,
            important_files,
            include_binary: self.include_binary,
            respect_gitignore: self.respect_gitignore.unwrap_or(defaults.respect_gitignore),
            follow_symlinks: self.follow_symlinks,
            max_tokens: self.max_tokens,
            max_files: self.max_files,
            max_file_size_bytes: self.max_file_size_bytes,
            max_lines_per_file: self.max_lines_per_file,
            compress_large_files: self
                .compress_large_files
                .unwrap_or(defaults.compress_large_files),
            compress_threshold_lines: self
                .compress_threshold_lines
                .unwrap_or(defaults.compress_threshold_lines),
            strip_comments: self.strip_comments,
            tokenizer: self.tokenizer.unwrap_or(defaults.tokenizer),
            score_weights: self.score_weights.unwrap_or(defaults.score_weights),
            include_structure: self.include_structure.unwrap_or(defaults.include_structure),
            include_dependencies: self
                .include_dependencies
                .unwrap_or(defaults.include_dependencies),
            include_instructions: self
                .include_instructions
                .unwrap_or(defaults.include_instructions),
            backup_existing: self.backup_existing.unwrap_or(defaults.backup_existing),
        };

        config.validate()?;
        Ok(config)
    }
}
