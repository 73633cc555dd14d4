use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CHARS_PER_TOKEN: usize = 4;
const WORD_WEIGHT: f64 = 1.3;
const SPECIAL_DIVISOR: usize = 10;

/// Type of tokenizer to use for estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenizerKind {
    /// Character-ratio tokenizer (~4 chars per token)
    CharRatio,
    /// Word-weighted tokenizer blending word and character counts
    WordWeighted,
}

impl TokenizerKind {
    /// Creates a new estimator instance of this kind.
    #[must_use]
    pub fn create(self) -> Arc<dyn TokenEstimator> {
        match self {
            Self::CharRatio => Arc::new(CharRatioEstimator),
            Self::WordWeighted => Arc::new(WordWeightedEstimator),
        }
    }
}

impl Default for TokenizerKind {
    fn default() -> Self {
        Self::CharRatio
    }
}

/// Trait for estimating token counts in text.
///
/// Implementations must be deterministic and monotonic in content length:
/// the budget accounting in the allocator depends on both properties.
pub trait TokenEstimator: Send + Sync {
    /// Estimates the number of tokens in the given text.
    fn estimate(&self, text: &str) -> usize;
}

/// Character-ratio estimator.
///
/// Uses a heuristic of approximately 4 characters per token, which works
/// reasonably well for source code.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CharRatioEstimator;

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count();
        char_count
            .saturating_add(CHARS_PER_TOKEN - 1)
            .saturating_div(CHARS_PER_TOKEN)
            .max(1)
    }
}

/// Word-weighted estimator.
///
/// Averages a word-count estimate (weighted by 1.3) with the character ratio
/// and adds a penalty for special characters. Slightly more accurate on
/// natural-language-heavy files than [`CharRatioEstimator`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct WordWeightedEstimator;

impl TokenEstimator for WordWeightedEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let words = count_words(text);
        let chars = text.chars().count();
        let special_chars = count_special_chars(text);

        let word_estimate = (f64::from(words as u32) * WORD_WEIGHT) as usize;
        let char_estimate = chars.saturating_div(CHARS_PER_TOKEN);
        let special_penalty = special_chars.saturating_div(SPECIAL_DIVISOR);

        let base_estimate = word_estimate
            .saturating_add(char_estimate)
            .saturating_div(2);

        base_estimate.saturating_add(special_penalty).max(1)
    }
}

/// Counts words in text (whitespace-separated).
#[inline]
fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts special (non-alphanumeric) characters.
#[inline]
fn count_special_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_ratio_empty() {
        let estimator = CharRatioEstimator;
        assert_eq!(estimator.estimate(""), 0);
    }

    #[test]
    fn test_char_ratio_basic() {
        let estimator = CharRatioEstimator;
        assert_eq!(estimator.estimate("test"), 1); // 4 chars = 1 token
        assert_eq!(estimator.estimate("hello world"), 3); // 11 chars = 3 tokens
    }

    #[test]
    fn test_char_ratio_long_text() {
        let estimator = CharRatioEstimator;
        let text = "a".repeat(1000);
        assert_eq!(estimator.estimate(&text), 250); // 1000/4 = 250
    }

    #[test]
    fn test_char_ratio_monotonic() {
        let estimator = CharRatioEstimator;
        let mut last = 0;
        for n in [10usize, 100, 500, 2000] {
            let estimate = estimator.estimate(&"x".repeat(n));
            assert!(estimate >= last);
            last = estimate;
        }
    }

    #[test]
    fn test_word_weighted_empty() {
        let estimator = WordWeightedEstimator;
        assert_eq!(estimator.estimate(""), 0);
    }

    #[test]
    fn test_word_weighted_basic() {
        let estimator = WordWeightedEstimator;
        let result = estimator.estimate("hello world");
        assert!(result > 0);
        assert!(result < 10);
    }

    #[test]
    fn test_word_weighted_code() {
        let estimator = WordWeightedEstimator;
        let code = r#"
            fn main() {
                println!("Hello, world!");
            }
        "#;
        let result = estimator.estimate(code);
        assert!(result > 5);
        assert!(result < 30);
    }

    #[test]
    fn test_kind_creates_estimator() {
        let estimator = TokenizerKind::CharRatio.create();
        assert_eq!(estimator.estimate("abcd"), 1);

        let estimator = TokenizerKind::WordWeighted.create();
        assert!(estimator.estimate("abcd") >= 1);
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("hello"), 1);
        assert_eq!(count_words("hello world"), 2);
        assert_eq!(count_words("  hello   world  "), 2);
    }

    #[test]
    fn test_count_special_chars() {
        assert_eq!(count_special_chars("hello"), 0);
        assert_eq!(count_special_chars("hello!"), 1);
        assert_eq!(count_special_chars("fn main() {}"), 4);
    }
}
