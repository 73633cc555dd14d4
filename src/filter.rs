//! Admissibility rules for scanned records.
//!
//! The filter decides, per record, whether the allocator may consider it and
//! attributes every exclusion to a statistic bucket. It has no side effects
//! beyond the skip log.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::file::FileRecord;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::RegexSet;
use std::collections::HashSet;
use tracing::debug;

/// Outcome of the admissibility check for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Record is admissible and proceeds to prioritization
    Admit,
    /// Record matched an ignore rule
    Ignored,
    /// Record looks binary and binary inclusion is off
    Binary,
    /// Record exceeds the oversize cutoff
    Oversize,
}

/// Applies ignore/include rules to the scanned record stream.
#[derive(Debug)]
pub(crate) struct Filter {
    ignore_set: RegexSet,
    ignore_segments: HashSet<String>,
    exclude_globs: GlobSet,
    important_files: HashSet<String>,
    include_binary: bool,
    max_file_size_bytes: Option<u64>,
}

impl Filter {
    /// Compiles the filter rules from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore regex or exclude glob fails to compile.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let ignore_set = RegexSet::new(&config.ignore_patterns).map_err(|e| {
            Error::pattern(config.ignore_patterns.join(", "), e.to_string())
        })?;

        let mut glob_builder = GlobSetBuilder::new();
        for pattern in &config.exclude_globs {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::pattern(pattern.clone(), e.to_string()))?;
            glob_builder.add(glob);
        }
        let exclude_globs = glob_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))?;

        Ok(Self {
            ignore_set,
            ignore_segments: config.ignore_segments.iter().cloned().collect(),
            exclude_globs,
            important_files: config.important_files.clone(),
            include_binary: config.include_binary,
            max_file_size_bytes: config.max_file_size_bytes,
        })
    }

    /// Decides admissibility for one record.
    ///
    /// Binary and oversize exclusions apply unconditionally; the
    /// important-filename override only beats ignore rules.
    pub(crate) fn decide(&self, record: &FileRecord) -> FilterDecision {
        if record.is_binary && !self.include_binary {
            debug!("Skipping binary file: {}", record.relative_path);
            return FilterDecision::Binary;
        }

        if let Some(limit) = self.max_file_size_bytes {
            if record.size_bytes > limit {
                debug!(
                    "Skipping oversize file ({} bytes): {}",
                    record.size_bytes, record.relative_path
                );
                return FilterDecision::Oversize;
            }
        }

        if self.important_files.contains(record.file_name()) {
            return FilterDecision::Admit;
        }

        if self.matches_ignore(record) {
            debug!("Skipping ignored file: {}", record.relative_path);
            return FilterDecision::Ignored;
        }

        FilterDecision::Admit
    }

    fn matches_ignore(&self, record: &FileRecord) -> bool {
        if record
            .relative_path
            .split('/')
            .any(|segment| self.ignore_segments.contains(segment))
        {
            return true;
        }

        if self.ignore_set.is_match(&record.relative_path) {
            return true;
        }

        self.exclude_globs.is_match(record.relative_path.as_str())
    }
}
