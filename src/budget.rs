use crate::compress::Compressor;
use crate::config::Config;
use crate::file::FileRecord;
use crate::pipeline::{CancelFlag, SelectionStats};
use crate::token::TokenEstimator;
use std::sync::Arc;
use tracing::{debug, warn};

/// One admitted file with the content that will be rendered.
///
/// `line_count` and `byte_size` describe the emitted content, which differs
/// from the record's on-disk metadata once compression or truncation ran.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// Scanner metadata for the file
    pub record: FileRecord,

    /// Content as it will appear in the digest
    pub content: String,

    /// Content was replaced by a structural summary
    pub was_compressed: bool,

    /// Content was cut to the per-file line ceiling
    pub was_truncated: bool,

    /// Line count of the emitted content
    pub line_count: usize,

    /// Byte size of the emitted content
    pub byte_size: u64,
}

/// Mutable accumulator of the run's budget counters.
///
/// Owned exclusively by one allocator run; an absent ceiling means the
/// corresponding counter is unbounded.
#[derive(Debug, Clone, Default)]
pub(crate) struct Budget {
    files_used: usize,
    tokens_used: usize,
    lines_used: usize,
    max_files: Option<usize>,
    max_tokens: Option<usize>,
}

impl Budget {
    fn new(config: &Config) -> Self {
        Self {
            max_files: config.max_files,
            max_tokens: config.max_tokens,
            ..Self::default()
        }
    }

    fn files_exhausted(&self) -> bool {
        self.max_files.is_some_and(|max| self.files_used >= max)
    }

    fn fits_tokens(&self, tokens: usize) -> bool {
        self.max_tokens
            .is_none_or(|max| self.tokens_used + tokens <= max)
    }

    fn admit(&mut self, tokens: usize, lines: usize) {
        self.files_used += 1;
        self.tokens_used += tokens;
        self.lines_used += lines;
    }
}

enum Admission {
    Selected(Box<SelectedFile>),
    OverBudget,
    ReadFailed,
}

/// Admits prioritized records while the budgets hold.
///
/// Iteration is strictly sequential in priority order; a skipped file is
/// never reconsidered, even when a later skip would have freed room for it.
pub(crate) struct Allocator<'a> {
    config: &'a Config,
    compressor: Compressor,
    tokenizer: Arc<dyn TokenEstimator>,
    cancel: CancelFlag,
}

impl<'a> Allocator<'a> {
    /// Creates a new allocator from configuration.
    pub(crate) fn new(config: &'a Config, cancel: CancelFlag) -> Self {
        Self {
            config,
            compressor: Compressor::new(config.strip_comments),
            tokenizer: config.tokenizer.create(),
            cancel,
        }
    }

    /// Runs the admission loop over the prioritized candidates.
    pub(crate) fn allocate(
        &self,
        ordered: Vec<FileRecord>,
        stats: &mut SelectionStats,
    ) -> Vec<SelectedFile> {
        let mut budget = Budget::new(self.config);
        let mut selected = Vec::new();
        let total = ordered.len();

        for (index, record) in ordered.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!("Allocation cancelled after {} admissions", selected.len());
                stats.cancelled = true;
                break;
            }

            // The file-count ceiling is a hard global cutoff: remaining
            // candidates are not evaluated individually.
            if budget.files_exhausted() {
                let remaining = total - index;
                debug!("File budget exhausted, skipping {remaining} remaining candidates");
                stats.skipped_budget += remaining;
                break;
            }

            match self.admit(&record, &mut budget) {
                Admission::Selected(file) => selected.push(*file),
                Admission::OverBudget => {
                    debug!("Token budget exceeded for {}", record.relative_path);
                    stats.skipped_budget += 1;
                }
                Admission::ReadFailed => stats.errors += 1,
            }
        }

        stats.total_admitted = selected.len();
        stats.tokens_used = budget.tokens_used;
        stats.lines_used = budget.lines_used;
        selected
    }

    fn admit(&self, record: &FileRecord, budget: &mut Budget) -> Admission {
        let mut content = match record.read_content() {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", record.relative_path, e);
                return Admission::ReadFailed;
            }
        };
        let mut was_compressed = false;
        let mut was_truncated = false;

        if self.config.compress_large_files
            && content.lines().count() > self.config.compress_threshold_lines
        {
            content = self.compressor.compress(&content, &record.extension);
            was_compressed = true;
        }

        self.apply_line_ceiling(&mut content, &mut was_truncated);

        let mut tokens = self.tokenizer.estimate(&content);

        if !budget.fits_tokens(tokens) {
            // Compression as a last resort before giving the file up.
            if !was_compressed && self.config.compress_large_files {
                content = self.compressor.compress(&content, &record.extension);
                was_compressed = true;
                self.apply_line_ceiling(&mut content, &mut was_truncated);
                tokens = self.tokenizer.estimate(&content);
            }

            if !budget.fits_tokens(tokens) {
                return Admission::OverBudget;
            }
        }

        let line_count = content.lines().count();
        budget.admit(tokens, line_count);

        Admission::Selected(Box::new(SelectedFile {
            record: record.clone(),
            byte_size: content.len() as u64,
            line_count,
            content,
            was_compressed,
            was_truncated,
        }))
    }

    fn apply_line_ceiling(&self, content: &mut String, was_truncated: &mut bool) {
        if let Some(max_lines) = self.config.max_lines_per_file {
            if content.lines().count() > max_lines {
                *content = truncate_head(content, max_lines);
                *was_truncated = true;
            }
        }
    }
}

/// Keeps the head of `content` so that the output, including the omission
/// marker, stays within `max_lines`.
pub(crate) fn truncate_head(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return content.to_string();
    }

    let keep = max_lines.saturating_sub(1);
    let mut out: Vec<String> = lines[..keep].iter().copied().map(str::to_string).collect();
    out.push(format!("... ({} more lines omitted)", lines.len() - keep));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    fn write_and_record(temp: &TempDir, name: &str, content: &str) -> FileRecord {
        let file = temp.child(name);
        file.write_str(content).unwrap();
        FileRecord::from_path(file.path(), temp.path()).unwrap()
    }

    fn numbered_lines(count: usize) -> String {
        (0..count)
            .map(|i| format!("line number {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_admits_within_budget() {
        let temp = TempDir::new().unwrap();
        let records = vec![
            write_and_record(&temp, "a.txt", "alpha\n"),
            write_and_record(&temp, "b.txt", "beta\n"),
        ];

        let config = Config::builder().root_dir(temp.path()).build().unwrap();
        let allocator = Allocator::new(&config, CancelFlag::new());
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        assert_eq!(selected.len(), 2);
        assert_eq!(stats.total_admitted, 2);
        assert_eq!(stats.skipped_budget, 0);
        assert!(stats.tokens_used > 0);
    }

    #[test]
    fn test_file_ceiling_is_hard_cutoff() {
        let temp = TempDir::new().unwrap();
        let records = vec![
            write_and_record(&temp, "a.txt", "alpha\n"),
            write_and_record(&temp, "b.txt", "beta\n"),
            write_and_record(&temp, "c.txt", "gamma\n"),
        ];

        let config = Config::builder()
            .root_dir(temp.path())
            .max_files(1)
            .build()
            .unwrap();
        let allocator = Allocator::new(&config, CancelFlag::new());
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record.relative_path, "a.txt");
        assert_eq!(stats.skipped_budget, 2);
    }

    #[test]
    fn test_token_ceiling_skips_without_abort() {
        let temp = TempDir::new().unwrap();
        let records = vec![
            write_and_record(&temp, "huge.txt", &numbered_lines(1000)),
            write_and_record(&temp, "tiny.txt", "ok\n"),
        ];

        let config = Config::builder()
            .root_dir(temp.path())
            .max_tokens(10)
            .build()
            .unwrap();
        let allocator = Allocator::new(&config, CancelFlag::new());
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        // The oversized file is skipped, the next candidate still admitted.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record.relative_path, "tiny.txt");
        assert_eq!(stats.skipped_budget, 1);
    }

    #[test]
    fn test_uncompressible_file_leaves_tokens_unused() {
        let temp = TempDir::new().unwrap();
        let records = vec![write_and_record(&temp, "huge.txt", &numbered_lines(1000))];

        let config = Config::builder()
            .root_dir(temp.path())
            .max_tokens(10)
            .build()
            .unwrap();
        let allocator = Allocator::new(&config, CancelFlag::new());
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        assert!(selected.is_empty());
        assert_eq!(stats.skipped_budget, 1);
        assert_eq!(stats.tokens_used, 0);
    }

    #[test]
    fn test_compression_triggers_above_threshold() {
        let temp = TempDir::new().unwrap();
        let code = (0..500)
            .map(|i| format!("fn generated_{i}() {{}}"))
            .collect::<Vec<_>>()
            .join("\n");
        let records = vec![write_and_record(&temp, "big.rs", &code)];

        let config = Config::builder()
            .root_dir(temp.path())
            .compress_threshold_lines(200)
            .build()
            .unwrap();
        let allocator = Allocator::new(&config, CancelFlag::new());
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        assert_eq!(selected.len(), 1);
        assert!(selected[0].was_compressed);
        assert!(selected[0].line_count < 500);
    }

    #[test]
    fn test_truncation_respects_line_ceiling() {
        let temp = TempDir::new().unwrap();
        let records = vec![write_and_record(&temp, "long.txt", &numbered_lines(100))];

        let config = Config::builder()
            .root_dir(temp.path())
            .compress_large_files(false)
            .max_lines_per_file(20)
            .build()
            .unwrap();
        let allocator = Allocator::new(&config, CancelFlag::new());
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        assert_eq!(selected.len(), 1);
        assert!(selected[0].was_truncated);
        assert!(selected[0].line_count <= 20);
        assert!(selected[0].content.contains("more lines omitted"));
    }

    #[test]
    fn test_compression_fallback_before_token_skip() {
        let temp = TempDir::new().unwrap();
        // 300 signature-bearing lines: compressible well below the raw size.
        let code = (0..300)
            .map(|i| format!("fn f{i}(argument_one: usize, argument_two: usize) -> usize {{ argument_one + argument_two + {i} }}"))
            .collect::<Vec<_>>()
            .join("\n");
        let records = vec![write_and_record(&temp, "dense.rs", &code)];

        let config = Config::builder()
            .root_dir(temp.path())
            // Threshold above the line count so the first pass skips
            // compression, forcing the token-ceiling fallback path.
            .compress_threshold_lines(1000)
            .max_tokens(5000)
            .build()
            .unwrap();
        let allocator = Allocator::new(&config, CancelFlag::new());
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        assert_eq!(selected.len(), 1);
        assert!(selected[0].was_compressed);
        assert!(stats.tokens_used <= 5000);
    }

    #[test]
    fn test_cancel_keeps_partial_output() {
        let temp = TempDir::new().unwrap();
        let records = vec![
            write_and_record(&temp, "a.txt", "alpha\n"),
            write_and_record(&temp, "b.txt", "beta\n"),
        ];

        let config = Config::builder().root_dir(temp.path()).build().unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let allocator = Allocator::new(&config, cancel);
        let mut stats = SelectionStats::default();

        let selected = allocator.allocate(records, &mut stats);

        assert!(selected.is_empty());
        assert!(stats.cancelled);
    }

    #[test]
    fn test_truncate_head_marker() {
        let content = numbered_lines(10);
        let truncated = truncate_head(&content, 5);

        assert_eq!(truncated.lines().count(), 5);
        assert!(truncated.contains("... (6 more lines omitted)"));

        // Already within the ceiling: untouched.
        assert_eq!(truncate_head(&content, 10), content);
    }
}
