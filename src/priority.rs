//! Importance scoring and admission ordering.
//!
//! Scoring is a pure function of the admissible set and the configuration:
//! no I/O, no randomness, no time-dependent tie-breaks. Ties are broken by
//! path lexical order so an unchanged tree always produces the same order.

use crate::config::Config;
use crate::file::FileRecord;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Extensions counted when detecting the project's primary language(s).
static SOURCE_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "kt", "c", "cpp", "cc", "h", "hpp",
        "cs", "rb", "php", "swift", "scala", "lua", "sh", "pl", "ex", "exs", "hs", "zig",
    ]
    .into_iter()
    .collect()
});

/// Sorts the admissible set by importance, descending.
///
/// Equal scores fall back to path lexical ascending order.
pub(crate) fn prioritize(records: Vec<FileRecord>, config: &Config) -> Vec<FileRecord> {
    let primary = dominant_extensions(&records);
    if !primary.is_empty() {
        debug!("Primary extensions: {:?}", {
            let mut sorted: Vec<_> = primary.iter().collect();
            sorted.sort();
            sorted
        });
    }

    let mut scored: Vec<(i64, FileRecord)> = records
        .into_iter()
        .map(|record| (score(&record, config, &primary), record))
        .collect();

    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.relative_path.cmp(&b.1.relative_path))
    });

    scored.into_iter().map(|(_, record)| record).collect()
}

/// The most frequent recognized source extension(s) in the admissible set.
///
/// All extensions tied for the maximum count are returned, so a mixed-language
/// tree gets more than one primary extension. Empty when the set holds no
/// recognized source files.
pub(crate) fn dominant_extensions(records: &[FileRecord]) -> HashSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        if SOURCE_EXTENSIONS.contains(record.extension.as_str()) {
            *counts.entry(record.extension.as_str()).or_default() += 1;
        }
    }

    let Some(&max) = counts.values().max() else {
        return HashSet::new();
    };

    counts
        .into_iter()
        .filter(|&(_, count)| count == max)
        .map(|(ext, _)| ext.to_string())
        .collect()
}

/// Computes the importance score for one record.
pub(crate) fn score(record: &FileRecord, config: &Config, primary: &HashSet<String>) -> i64 {
    let weights = &config.score_weights;
    let mut score = 0i64;

    if config.important_files.contains(record.file_name()) {
        score += weights.important_bonus;
    }

    if primary.contains(&record.extension) {
        score += weights.primary_ext_bonus;
    }

    let depth = record.depth();
    if depth < weights.depth_cap {
        score += weights.depth_step * (weights.depth_cap - depth) as i64;
    }

    if weights.line_penalty_divisor > 0 {
        let excess = record.line_count.saturating_sub(weights.line_soft_threshold);
        score -= (excess / weights.line_penalty_divisor) as i64;
    }

    for segment in record.relative_path.split('/') {
        let lowered = segment.to_lowercase();
        if lowered == "test" || lowered == "tests" {
            score -= weights.test_path_penalty;
            break;
        }
        if lowered == "example" || lowered == "examples" || lowered == "demo" {
            score -= weights.example_path_penalty;
            break;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    fn record(relative_path: &str, line_count: usize) -> FileRecord {
        FileRecord {
            relative_path: relative_path.to_string(),
            absolute_path: PathBuf::from("/project").join(relative_path),
            size_bytes: 100,
            line_count,
            extension: relative_path
                .rsplit('.')
                .next()
                .filter(|e| !e.contains('/'))
                .unwrap_or_default()
                .to_string(),
            is_binary: false,
            last_modified: None,
        }
    }

    fn test_config() -> Config {
        Config::builder().root_dir(".").build().unwrap()
    }

    #[test]
    fn test_dominant_extension_single_language() {
        let records = vec![
            record("a.py", 10),
            record("b.py", 10),
            record("c.js", 10),
            record("README.md", 10),
        ];

        let primary = dominant_extensions(&records);
        assert_eq!(primary.len(), 1);
        assert!(primary.contains("py"));
    }

    #[test]
    fn test_dominant_extension_tie() {
        let records = vec![record("a.py", 10), record("b.js", 10)];

        let primary = dominant_extensions(&records);
        assert!(primary.contains("py"));
        assert!(primary.contains("js"));
    }

    #[test]
    fn test_dominant_extension_no_source_files() {
        let records = vec![record("notes.md", 10), record("data.csv", 10)];
        assert!(dominant_extensions(&records).is_empty());
    }

    #[test]
    fn test_important_file_outranks_source() {
        let config = test_config();
        let records = vec![record("util.py", 30), record("Cargo.toml", 5)];
        let primary = dominant_extensions(&records);

        assert!(score(&records[1], &config, &primary) > score(&records[0], &config, &primary));
    }

    #[test]
    fn test_primary_extension_bonus() {
        let config = test_config();
        let records = vec![
            record("a.py", 10),
            record("b.py", 10),
            record("style.css", 10),
        ];
        let primary = dominant_extensions(&records);

        assert!(score(&records[0], &config, &primary) > score(&records[2], &config, &primary));
    }

    #[test]
    fn test_shallow_path_outranks_deep() {
        let config = test_config();
        let shallow = record("main.py", 10);
        let deep = record("a/b/c/d/helper.py", 10);
        let primary = HashSet::new();

        assert!(score(&shallow, &config, &primary) > score(&deep, &config, &primary));
    }

    #[test]
    fn test_large_file_penalized() {
        let config = test_config();
        let small = record("small.py", 50);
        let huge = record("small2.py", 10_000);
        let primary = HashSet::new();

        assert!(score(&small, &config, &primary) > score(&huge, &config, &primary));
    }

    #[test]
    fn test_test_paths_penalized() {
        let config = test_config();
        let prod = record("src/logic.py", 10);
        let test = record("tests/logic.py", 10);
        let primary = HashSet::new();

        assert!(score(&prod, &config, &primary) > score(&test, &config, &primary));
    }

    #[test]
    fn test_prioritize_orders_by_score_then_path() {
        let config = test_config();
        let records = vec![
            record("z_helper.py", 10),
            record("a_helper.py", 10),
            record("main.py", 10),
        ];

        let ordered = prioritize(records, &config);
        let paths: Vec<_> = ordered.iter().map(|r| r.relative_path.as_str()).collect();

        // main.py is important; the equal-score helpers tie-break lexically.
        assert_eq!(paths, vec!["main.py", "a_helper.py", "z_helper.py"]);
    }

    #[test]
    fn test_prioritize_deterministic() {
        let config = test_config();
        let make = || {
            vec![
                record("b.py", 700),
                record("a.py", 10),
                record("lib/core.py", 200),
                record("Cargo.toml", 3),
            ]
        };

        let first: Vec<_> = prioritize(make(), &config)
            .into_iter()
            .map(|r| r.relative_path)
            .collect();
        let second: Vec<_> = prioritize(make(), &config)
            .into_iter()
            .map(|r| r.relative_path)
            .collect();

        assert_eq!(first, second);
    }
}
