use crate::{
    budget::{Allocator, SelectedFile},
    config::Config,
    error::Result,
    filter::{Filter, FilterDecision},
    priority,
    scanner::Scanner,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{info, instrument};

/// Cooperative cancellation handle for a running pipeline.
///
/// Checked at every scanner yield and allocator iteration boundary; a
/// cancelled run returns whatever was admitted up to that point instead of
/// failing.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a new, un-cancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Aggregate statistics for one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionStats {
    /// Files yielded by the scanner
    pub total_scanned: usize,

    /// Files admitted into the digest
    pub total_admitted: usize,

    /// Files excluded by ignore rules
    pub skipped_ignored: usize,

    /// Files excluded as binary
    pub skipped_binary: usize,

    /// Files excluded by the oversize cutoff
    pub skipped_oversize: usize,

    /// Admissible files excluded solely by a budget ceiling
    pub skipped_budget: usize,

    /// Unreadable entries absorbed as recoverable skips
    pub errors: usize,

    /// Tokens consumed by the admitted files
    pub tokens_used: usize,

    /// Content lines emitted for the admitted files
    pub lines_used: usize,

    /// The run was cancelled before the candidate list was exhausted
    pub cancelled: bool,
}

/// The ordered outcome of one pipeline run, handed whole to the renderer.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    /// Admitted files in admission (priority) order
    pub selected: Vec<SelectedFile>,

    /// Run statistics
    pub stats: SelectionStats,
}

/// Main pipeline orchestrator: scan, filter, prioritize, allocate.
pub struct Pipeline {
    config: Config,
    cancel: CancelFlag,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_cancel(config, CancelFlag::new())
    }

    /// Creates a pipeline that honors an externally owned cancel flag.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_cancel(config: Config, cancel: CancelFlag) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, cancel })
    }

    /// Executes the pipeline and returns the selection.
    ///
    /// # Process
    ///
    /// 1. **Scan**: lazily walk the tree, yielding one record per file
    /// 2. **Filter**: attribute every exclusion to a statistic bucket
    /// 3. **Prioritize**: sort admissible records by importance
    /// 4. **Allocate**: admit records in order while budgets hold
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions (invalid configuration or
    /// uncompilable patterns); per-file failures are absorbed into the
    /// statistics.
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<SelectionResult> {
        let start_time = Instant::now();
        let mut stats = SelectionStats::default();

        let scanner = Scanner::new(&self.config, self.cancel.clone());
        let filter = Filter::new(&self.config)?;

        info!("Scanning {}", self.config.root_dir.display());
        let scan_start = Instant::now();

        // Records stream out of the walker one at a time; only the
        // admissible subset is ever materialized.
        let mut admissible = Vec::new();
        for record in scanner.records() {
            stats.total_scanned += 1;
            match filter.decide(&record) {
                FilterDecision::Admit => admissible.push(record),
                FilterDecision::Ignored => stats.skipped_ignored += 1,
                FilterDecision::Binary => stats.skipped_binary += 1,
                FilterDecision::Oversize => stats.skipped_oversize += 1,
            }
        }
        stats.errors += scanner.error_count();
        if self.cancel.is_cancelled() {
            stats.cancelled = true;
        }

        info!(
            "Scanned {} files ({} admissible) in {:.2}s",
            stats.total_scanned,
            admissible.len(),
            scan_start.elapsed().as_secs_f64()
        );

        let ordered = priority::prioritize(admissible, &self.config);

        let allocate_start = Instant::now();
        let allocator = Allocator::new(&self.config, self.cancel.clone());
        let selected = allocator.allocate(ordered, &mut stats);

        info!(
            "Admitted {} files ({} tokens) in {:.2}s, {} skipped for budget",
            stats.total_admitted,
            stats.tokens_used,
            allocate_start.elapsed().as_secs_f64(),
            stats.skipped_budget
        );

        info!(
            "Selection complete in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );

        Ok(SelectionResult { selected, stats })
    }
}
