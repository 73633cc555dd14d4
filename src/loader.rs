//! Configuration file discovery and merging.
//!
//! Two optional JSON sources feed the builder: a user-level file in the
//! platform config directory and a project-level `.repomap.json` at the
//! scanned root. Precedence, lowest to highest: built-in defaults, user
//! file, project file, CLI flags. Missing files are not errors; malformed
//! files are fatal.

use crate::config::ConfigBuilder;
use crate::error::{Error, Result};
use crate::token::TokenizerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const PROJECT_CONFIG_FILENAME: &str = ".repomap.json";

/// Serialized subset of the configuration.
///
/// List fields extend the defaults; option fields replace them when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Additional ignore regexes
    pub ignore_patterns: Vec<String>,

    /// Replacement for the default ignored path segments
    pub ignore_segments: Option<Vec<String>>,

    /// Additional exclude globs
    pub exclude_globs: Vec<String>,

    /// Additional important filenames
    pub important_files: Vec<String>,

    /// Run-wide token budget
    pub max_tokens: Option<usize>,

    /// Run-wide file-count budget
    pub max_files: Option<usize>,

    /// Oversize cutoff in bytes
    pub max_file_size_bytes: Option<u64>,

    /// Per-file line ceiling
    pub max_lines_per_file: Option<usize>,

    /// Compression toggle
    pub compress_large_files: Option<bool>,

    /// Compression threshold in lines
    pub compress_threshold_lines: Option<usize>,

    /// Comment stripping toggle
    pub strip_comments: Option<bool>,

    /// Symlink traversal toggle
    pub follow_symlinks: Option<bool>,

    /// `.gitignore` handling toggle
    pub respect_gitignore: Option<bool>,

    /// Binary inclusion toggle
    pub include_binary: Option<bool>,

    /// Token estimator selection
    pub tokenizer: Option<TokenizerKind>,
}

impl ConfigFile {
    /// Folds a higher-precedence layer into this one.
    pub fn merge(&mut self, overlay: Self) {
        self.ignore_patterns.extend(overlay.ignore_patterns);
        self.exclude_globs.extend(overlay.exclude_globs);
        self.important_files.extend(overlay.important_files);

        self.ignore_segments = overlay.ignore_segments.or(self.ignore_segments.take());
        self.max_tokens = overlay.max_tokens.or(self.max_tokens);
        self.max_files = overlay.max_files.or(self.max_files);
        self.max_file_size_bytes = overlay.max_file_size_bytes.or(self.max_file_size_bytes);
        self.max_lines_per_file = overlay.max_lines_per_file.or(self.max_lines_per_file);
        self.compress_large_files = overlay.compress_large_files.or(self.compress_large_files);
        self.compress_threshold_lines = overlay
            .compress_threshold_lines
            .or(self.compress_threshold_lines);
        self.strip_comments = overlay.strip_comments.or(self.strip_comments);
        self.follow_symlinks = overlay.follow_symlinks.or(self.follow_symlinks);
        self.respect_gitignore = overlay.respect_gitignore.or(self.respect_gitignore);
        self.include_binary = overlay.include_binary.or(self.include_binary);
        self.tokenizer = overlay.tokenizer.or(self.tokenizer);
    }

    /// Applies this layer onto a builder.
    #[must_use]
    pub fn apply(self, builder: ConfigBuilder) -> ConfigBuilder {
        let mut builder = builder
            .extra_ignore_patterns(self.ignore_patterns)
            .exclude_globs(self.exclude_globs)
            .extra_important_files(self.important_files);

        if let Some(segments) = self.ignore_segments {
            builder = builder.ignore_segments(segments);
        }
        if let Some(tokens) = self.max_tokens {
            builder = builder.max_tokens(tokens);
        }
        if let Some(files) = self.max_files {
            builder = builder.max_files(files);
        }
        if let Some(bytes) = self.max_file_size_bytes {
            builder = builder.max_file_size_bytes(bytes);
        }
        if let Some(lines) = self.max_lines_per_file {
            builder = builder.max_lines_per_file(lines);
        }
        if let Some(enabled) = self.compress_large_files {
            builder = builder.compress_large_files(enabled);
        }
        if let Some(lines) = self.compress_threshold_lines {
            builder = builder.compress_threshold_lines(lines);
        }
        if let Some(enabled) = self.strip_comments {
            builder = builder.strip_comments(enabled);
        }
        if let Some(enabled) = self.follow_symlinks {
            builder = builder.follow_symlinks(enabled);
        }
        if let Some(enabled) = self.respect_gitignore {
            builder = builder.respect_gitignore(enabled);
        }
        if let Some(enabled) = self.include_binary {
            builder = builder.include_binary(enabled);
        }
        if let Some(kind) = self.tokenizer {
            builder = builder.tokenizer(kind);
        }

        builder
    }
}

/// Locates and parses configuration files.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    user_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader pointed at the platform config directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_path: dirs::config_dir().map(|dir| dir.join("repomap/config.json")),
        }
    }

    /// Overrides the user config location (used in tests).
    #[must_use]
    pub fn with_user_path(path: impl Into<PathBuf>) -> Self {
        Self {
            user_path: Some(path.into()),
        }
    }

    /// Loads the user-level configuration file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is not valid JSON.
    pub fn load_user(&self) -> Result<Option<ConfigFile>> {
        match &self.user_path {
            Some(path) => Self::load_file(path),
            None => Ok(None),
        }
    }

    /// Loads the project-level `.repomap.json` from the scanned root, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is not valid JSON.
    pub fn load_project(root: &Path) -> Result<Option<ConfigFile>> {
        Self::load_file(&root.join(PROJECT_CONFIG_FILENAME))
    }

    fn load_file(path: &Path) -> Result<Option<ConfigFile>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let parsed: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Malformed configuration file {}: {e}",
                path.display()
            ))
        })?;

        debug!("Loaded configuration from {}", path.display());
        Ok(Some(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_missing_file_is_none() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(ConfigLoader::load_project(temp.path()).unwrap().is_none());

        let loader = ConfigLoader::with_user_path(temp.path().join("absent.json"));
        assert!(loader.load_user().unwrap().is_none());
    }

    #[test]
    fn test_parses_project_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".repomap.json")
            .write_str(
                r#"{
                    "max_tokens": 50000,
                    "ignore_patterns": ["\\.log$"],
                    "strip_comments": true,
                    "tokenizer": "word-weighted"
                }"#,
            )
            .unwrap();

        let parsed = ConfigLoader::load_project(temp.path()).unwrap().unwrap();

        assert_eq!(parsed.max_tokens, Some(50_000));
        assert_eq!(parsed.ignore_patterns, vec![r"\.log$"]);
        assert_eq!(parsed.strip_comments, Some(true));
        assert_eq!(parsed.tokenizer, Some(TokenizerKind::WordWeighted));
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".repomap.json").write_str("not json").unwrap();

        let result = ConfigLoader::load_project(temp.path());
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_merge_precedence() {
        let mut base = ConfigFile {
            max_tokens: Some(10_000),
            max_files: Some(50),
            ignore_patterns: vec!["a".to_string()],
            ..Default::default()
        };
        let overlay = ConfigFile {
            max_tokens: Some(99_000),
            ignore_patterns: vec!["b".to_string()],
            ..Default::default()
        };

        base.merge(overlay);

        assert_eq!(base.max_tokens, Some(99_000));
        assert_eq!(base.max_files, Some(50));
        assert_eq!(base.ignore_patterns, vec!["a", "b"]);
    }

    #[test]
    fn test_apply_onto_builder() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = ConfigFile {
            max_files: Some(3),
            compress_large_files: Some(false),
            important_files: vec!["custom.cfg".to_string()],
            ..Default::default()
        };

        let config = file
            .apply(crate::Config::builder())
            .root_dir(temp.path())
            .build()
            .unwrap();

        assert_eq!(config.max_files, Some(3));
        assert!(!config.compress_large_files);
        assert!(config.important_files.contains("custom.cfg"));
        assert!(config.important_files.contains("Cargo.toml"));
    }
}
