//! # repomap
//!
//! A library for extracting bounded, LLM-ready digests of code repositories.
//!
//! ## Features
//!
//! - Lazy filesystem scanning with `.gitignore` support
//! - Regex, segment and glob ignore rules with important-file overrides
//! - Deterministic importance scoring and priority-ordered admission
//! - Token, file-count and per-file line budgets
//! - Structural compression of oversized files (signatures over bodies)
//! - Markdown rendering with tree view and dependency list
//!
//! ## Quick Start
//!
//! ```no_run
//! use repomap::{Config, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./src")
//!     .max_tokens(100_000)
//!     .max_files(50)
//!     .build()?;
//!
//! let selection = Pipeline::new(config)?.run()?;
//! println!("admitted {} files", selection.stats.total_admitted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Scanner**: lazily discovers files in deterministic order
//! 2. **Filter**: applies ignore/binary/oversize rules
//! 3. **Prioritizer**: scores and orders the admissible set
//! 4. **Budget Allocator**: admits files while budgets hold, compressing
//!    oversized content via the **Compressor**
//!
//! The resulting [`SelectionResult`] is handed to the [`Renderer`] and
//! [`Writer`], which are thin formatting and output glue.

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod budget;
mod compress;
mod config;
mod error;
mod file;
mod filter;
mod loader;
mod pipeline;
mod priority;
mod scanner;
mod template;
mod token;
mod writer;

pub use budget::SelectedFile;
pub use config::{Config, ConfigBuilder, ScoreWeights};
pub use error::{Error, Result};
pub use file::FileRecord;
pub use filter::FilterDecision;
pub use loader::{ConfigFile, ConfigLoader};
pub use pipeline::{CancelFlag, Pipeline, SelectionResult, SelectionStats};
pub use template::Renderer;
pub use token::{TokenEstimator, TokenizerKind};
pub use writer::Writer;

/// Runs the selection pipeline with the given configuration.
///
/// This is the main entry point for the library; rendering and output stay
/// with the caller.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Root directory doesn't exist or is not a directory
/// - An ignore pattern fails to compile
///
/// # Examples
///
/// ```no_run
/// use repomap::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .build()?;
///
/// let selection = run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<SelectionResult> {
    Pipeline::new(config)?.run()
}
