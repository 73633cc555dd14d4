use anyhow::Context;
use clap::Parser;
use repomap::{Config, ConfigFile, ConfigLoader, Pipeline, Renderer, TokenizerKind, Writer};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "repomap",
    version,
    author,
    about = "Extract a bounded, LLM-ready digest of a code repository",
    long_about = "Extract a bounded, LLM-ready digest of a code repository.\n\n\
    This tool scans a directory, selects the most important files under \
    explicit budgets (tokens, file count, lines per file), compresses \
    oversized files into structural summaries, and renders a single \
    Markdown document.\n\n\
    USAGE EXAMPLES:\n  \
      # Digest the current directory to stdout\n  \
      repomap\n\n  \
      # Digest a project into a file under a token budget\n  \
      repomap --dir ./my-project --output context.md --max-tokens 100000\n\n  \
      # Tight digest: 30 files, comments stripped\n  \
      repomap --dir ./src --max-files 30 --strip-comments"
)]
struct Cli {
    /// Root directory to scan
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    dir: PathBuf,

    /// Output file for the digest (stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Token budget for the whole digest
    #[arg(long, value_name = "N")]
    max_tokens: Option<usize>,

    /// Maximum number of files to include
    #[arg(long, value_name = "N")]
    max_files: Option<usize>,

    /// Skip files larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_file_size: Option<u64>,

    /// Per-file line ceiling
    #[arg(long, value_name = "N")]
    max_lines: Option<usize>,

    /// Disable structural compression of oversized files
    #[arg(long)]
    no_compress: bool,

    /// Line count above which compression triggers
    #[arg(long, value_name = "N")]
    compress_threshold: Option<usize>,

    /// Strip comments during compression
    #[arg(long)]
    strip_comments: bool,

    /// Follow symbolic links during traversal
    #[arg(long)]
    follow_symlinks: bool,

    /// Do not honor .gitignore rules
    #[arg(long)]
    no_gitignore: bool,

    /// Include binary files in the digest
    #[arg(long)]
    include_binary: bool,

    /// Additional ignore regex (repeatable)
    #[arg(long = "ignore", value_name = "REGEX")]
    ignore: Vec<String>,

    /// Exclude glob pattern (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Additional important filename (repeatable)
    #[arg(long = "important", value_name = "NAME")]
    important: Vec<String>,

    /// Token estimator to use
    #[arg(long, value_enum)]
    tokenizer: Option<CliTokenizer>,

    /// Omit the project structure section
    #[arg(long)]
    no_structure: bool,

    /// Omit the dependency section
    #[arg(long)]
    no_dependencies: bool,

    /// Omit the LLM instruction header
    #[arg(long)]
    no_instructions: bool,

    /// Do not back up an existing output file
    #[arg(long)]
    no_backup: bool,

    /// Skip user and project configuration files
    #[arg(long)]
    no_config: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliTokenizer {
    CharRatio,
    WordWeighted,
}

impl From<CliTokenizer> for TokenizerKind {
    fn from(t: CliTokenizer) -> Self {
        match t {
            CliTokenizer::CharRatio => Self::CharRatio,
            CliTokenizer::WordWeighted => Self::WordWeighted,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let config = build_config(cli)?;

    let selection = Pipeline::new(config.clone())
        .context("Failed to create pipeline")?
        .run()
        .context("Selection failed")?;

    let document = Renderer::new(&config)
        .context("Failed to initialize renderer")?
        .render(&selection)
        .context("Failed to render digest")?;

    Writer::new(&config)
        .write(&document)
        .context("Failed to write output")?;

    Ok(())
}

/// Resolves the effective configuration: defaults, then the user config
/// file, then the project config file, then CLI flags.
fn build_config(cli: Cli) -> anyhow::Result<Config> {
    let mut file_layer = ConfigFile::default();

    if !cli.no_config {
        let loader = ConfigLoader::new();
        if let Some(user) = loader.load_user().context("Failed to load user config")? {
            file_layer.merge(user);
        }
        if let Some(project) =
            ConfigLoader::load_project(&cli.dir).context("Failed to load project config")?
        {
            file_layer.merge(project);
        }
    }

    // Repeatable CLI lists extend the file layer.
    file_layer.ignore_patterns.extend(cli.ignore);
    file_layer.exclude_globs.extend(cli.exclude);
    file_layer.important_files.extend(cli.important);

    let mut builder = file_layer.apply(Config::builder()).root_dir(cli.dir);

    if let Some(output) = cli.output {
        builder = builder.output_path(output);
    }
    if let Some(tokens) = cli.max_tokens {
        builder = builder.max_tokens(tokens);
    }
    if let Some(files) = cli.max_files {
        builder = builder.max_files(files);
    }
    if let Some(bytes) = cli.max_file_size {
        builder = builder.max_file_size_bytes(bytes);
    }
    if let Some(lines) = cli.max_lines {
        builder = builder.max_lines_per_file(lines);
    }
    if let Some(lines) = cli.compress_threshold {
        builder = builder.compress_threshold_lines(lines);
    }
    if let Some(tokenizer) = cli.tokenizer {
        builder = builder.tokenizer(tokenizer.into());
    }
    if cli.no_compress {
        builder = builder.compress_large_files(false);
    }
    if cli.strip_comments {
        builder = builder.strip_comments(true);
    }
    if cli.follow_symlinks {
        builder = builder.follow_symlinks(true);
    }
    if cli.no_gitignore {
        builder = builder.respect_gitignore(false);
    }
    if cli.include_binary {
        builder = builder.include_binary(true);
    }
    if cli.no_structure {
        builder = builder.include_structure(false);
    }
    if cli.no_dependencies {
        builder = builder.include_dependencies(false);
    }
    if cli.no_instructions {
        builder = builder.include_instructions(false);
    }
    if cli.no_backup {
        builder = builder.backup_existing(false);
    }

    builder.build().context("Failed to build configuration")
}

/// Logs go to stderr so a stdout digest stays clean.
fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("repomap=warn"),
        1 => EnvFilter::new("repomap=info"),
        2 => EnvFilter::new("repomap=debug"),
        _ => EnvFilter::new("repomap=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
