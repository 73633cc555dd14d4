//! Structural compression of oversized file content.
//!
//! Compression is lossy shortening, not byte-level compression: comments are
//! stripped, top-level declarations are kept as one-line signatures, and
//! anything without recognizable structure degrades to head+tail truncation.
//! The registry maps extensions to pattern rules; supporting a new language
//! means adding an entry, not new control flow.

use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashMap;

const MIN_SIGNATURE_LINES: usize = 3;
const TRUNCATE_HEAD_TAIL: usize = 30;
const MAX_SIGNATURE_INDENT: usize = 4;

/// Pattern rules for one language family.
#[derive(Debug)]
pub(crate) struct LanguageRules {
    line_comment: Option<&'static str>,
    block_comment: Option<(&'static str, &'static str)>,
    signature_prefixes: &'static [&'static str],
    strip_comments: bool,
    extract_signatures: bool,
}

static RUST_RULES: LanguageRules = LanguageRules {
    line_comment: Some("//"),
    block_comment: Some(("/*", "*/")),
    signature_prefixes: &[
        "fn ", "pub ", "struct ", "enum ", "trait ", "impl ", "mod ", "const ", "static ",
        "type ", "macro_rules!", "unsafe ", "async fn ", "use ",
    ],
    strip_comments: true,
    extract_signatures: true,
};

static PYTHON_RULES: LanguageRules = LanguageRules {
    line_comment: Some("#"),
    block_comment: Some(("\"\"\"", "\"\"\"")),
    signature_prefixes: &["def ", "async def ", "class ", "@", "import ", "from "],
    strip_comments: true,
    extract_signatures: true,
};

static JS_RULES: LanguageRules = LanguageRules {
    line_comment: Some("//"),
    block_comment: Some(("/*", "*/")),
    signature_prefixes: &[
        "function ", "async function ", "class ", "export ", "const ", "let ", "var ",
        "interface ", "type ", "enum ", "import ",
    ],
    strip_comments: true,
    extract_signatures: true,
};

static GO_RULES: LanguageRules = LanguageRules {
    line_comment: Some("//"),
    block_comment: Some(("/*", "*/")),
    signature_prefixes: &["func ", "type ", "var ", "const ", "package ", "import "],
    strip_comments: true,
    extract_signatures: true,
};

static JAVA_RULES: LanguageRules = LanguageRules {
    line_comment: Some("//"),
    block_comment: Some(("/*", "*/")),
    signature_prefixes: &[
        "public ", "private ", "protected ", "class ", "interface ", "enum ", "package ",
        "import ", "@",
    ],
    strip_comments: true,
    extract_signatures: true,
};

static C_RULES: LanguageRules = LanguageRules {
    line_comment: Some("//"),
    block_comment: Some(("/*", "*/")),
    signature_prefixes: &[
        "#include", "#define", "typedef ", "struct ", "enum ", "union ", "static ", "extern ",
        "void ", "int ", "char ", "unsigned ", "bool ",
    ],
    strip_comments: true,
    extract_signatures: true,
};

static RUBY_RULES: LanguageRules = LanguageRules {
    line_comment: Some("#"),
    block_comment: None,
    signature_prefixes: &["def ", "class ", "module ", "require "],
    strip_comments: true,
    extract_signatures: true,
};

static SHELL_RULES: LanguageRules = LanguageRules {
    line_comment: Some("#"),
    block_comment: None,
    signature_prefixes: &["function ", "export ", "alias ", "source "],
    strip_comments: true,
    extract_signatures: false,
};

/// No recognized structure: comment handling off, truncation only.
static PLAIN_RULES: LanguageRules = LanguageRules {
    line_comment: None,
    block_comment: None,
    signature_prefixes: &[],
    strip_comments: false,
    extract_signatures: false,
};

static REGISTRY: Lazy<HashMap<&'static str, &'static LanguageRules>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, &'static LanguageRules> = HashMap::new();
    map.insert("rs", &RUST_RULES);
    for ext in ["py", "pyi", "pyw"] {
        map.insert(ext, &PYTHON_RULES);
    }
    for ext in ["js", "jsx", "ts", "tsx", "mjs", "cjs"] {
        map.insert(ext, &JS_RULES);
    }
    map.insert("go", &GO_RULES);
    for ext in ["java", "kt", "kts", "scala"] {
        map.insert(ext, &JAVA_RULES);
    }
    for ext in ["c", "h", "cpp", "cc", "cxx", "hpp", "hh", "cs"] {
        map.insert(ext, &C_RULES);
    }
    map.insert("rb", &RUBY_RULES);
    for ext in ["sh", "bash", "zsh"] {
        map.insert(ext, &SHELL_RULES);
    }
    map
});

fn rules_for(extension: &str) -> &'static LanguageRules {
    REGISTRY.get(extension).copied().unwrap_or(&PLAIN_RULES)
}

/// Transforms oversized content into a shorter structural summary.
///
/// Infallible by construction: any input without usable structure falls back
/// to head+tail truncation, and the output is strictly shorter in lines than
/// the input whenever the input has more than two lines.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Compressor {
    strip_comments: bool,
}

impl Compressor {
    /// Creates a compressor; `strip_comments` enables the comment pass.
    pub(crate) const fn new(strip_comments: bool) -> Self {
        Self { strip_comments }
    }

    /// Compresses `content` according to the rules for `extension`.
    pub(crate) fn compress(&self, content: &str, extension: &str) -> String {
        let rules = rules_for(extension);
        let input_lines = content.lines().count();

        let work: Cow<'_, str> = if self.strip_comments && rules.strip_comments {
            Cow::Owned(strip_comment_lines(content, rules))
        } else {
            Cow::Borrowed(content)
        };

        if rules.extract_signatures {
            let signatures = extract_signatures(&work, rules);
            if signatures.len() >= MIN_SIGNATURE_LINES {
                let mut out = Vec::with_capacity(signatures.len() + 1);
                for (line_no, signature) in &signatures {
                    out.push(format!("{line_no:>5}: {signature}"));
                }
                out.push(format!(
                    "... {} lines elided ...",
                    input_lines.saturating_sub(signatures.len())
                ));

                if out.len() < input_lines {
                    return out.join("\n");
                }
            }
        }

        head_tail_truncate(&work, TRUNCATE_HEAD_TAIL)
    }
}

/// Keeps the first and last `keep` lines around an omission marker.
///
/// The cap on `keep` guarantees the output is strictly shorter than the input
/// for any input of three or more lines.
pub(crate) fn head_tail_truncate(content: &str, keep: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    if total <= 2 {
        return lines.first().copied().unwrap_or("").to_string();
    }

    let keep = keep.min(total.saturating_sub(2) / 2);
    if keep == 0 {
        return format!("{}\n... ({} lines omitted) ...", lines[0], total - 1);
    }

    let mut out = Vec::with_capacity(keep * 2 + 1);
    out.extend(lines[..keep].iter().copied().map(str::to_string));
    out.push(format!("... ({} lines omitted) ...", total - keep * 2));
    out.extend(lines[total - keep..].iter().copied().map(str::to_string));
    out.join("\n")
}

/// Removes comment lines and trailing line comments.
///
/// String literals are respected when scanning for the line-comment marker;
/// block comments (and Python docstrings, whose delimiters toggle) drop
/// whole lines.
fn strip_comment_lines(content: &str, rules: &LanguageRules) -> String {
    let mut out = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if in_block {
            if let Some((_, end)) = rules.block_comment {
                if trimmed.ends_with(end) || trimmed == end.trim() {
                    in_block = false;
                }
            }
            continue;
        }

        if let Some((start, end)) = rules.block_comment {
            if trimmed.starts_with(start) {
                let closes_inline = trimmed.len() > start.len() && trimmed.ends_with(end);
                if !closes_inline {
                    in_block = true;
                }
                continue;
            }
        }

        if let Some(marker) = rules.line_comment {
            if trimmed.starts_with(marker) {
                continue;
            }
            let stripped = strip_trailing_comment(line, marker);
            out.push(stripped);
            continue;
        }

        out.push(line.to_string());
    }

    out.join("\n")
}

/// Cuts a trailing line comment while preserving comment markers inside
/// string literals.
fn strip_trailing_comment(line: &str, marker: &str) -> String {
    let bytes = line.as_bytes();
    let marker_bytes = marker.as_bytes();
    let mut in_string = false;
    let mut string_delim = b'"';
    let mut escape_next = false;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];

        if escape_next {
            escape_next = false;
            i += 1;
            continue;
        }

        match b {
            b'\\' if in_string => escape_next = true,
            b'"' | b'\'' => {
                if in_string {
                    if b == string_delim {
                        in_string = false;
                    }
                } else {
                    in_string = true;
                    string_delim = b;
                }
            }
            _ if !in_string && bytes[i..].starts_with(marker_bytes) => {
                return line[..i].trim_end().to_string();
            }
            _ => {}
        }

        i += 1;
    }

    line.to_string()
}

/// Finds top-level declarations by prefix and indentation heuristics.
///
/// Returns `(1-based line number, signature)` pairs with bodies replaced by
/// a placeholder.
fn extract_signatures(content: &str, rules: &LanguageRules) -> Vec<(usize, String)> {
    let mut signatures = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }

        let indent = line.len() - trimmed.len();
        if indent > MAX_SIGNATURE_INDENT {
            continue;
        }

        if rules
            .signature_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
        {
            let mut signature = trimmed.trim_end().to_string();
            if let Some(head) = signature.strip_suffix('{') {
                signature = format!("{} {{ ... }}", head.trim_end());
            } else if signature.ends_with(':') {
                signature.push_str(" ...");
            }
            signatures.push((idx + 1, signature));
        }
    }

    signatures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_count(s: &str) -> usize {
        s.lines().count()
    }

    #[test]
    fn test_rust_signatures_extracted() {
        let compressor = Compressor::new(false);
        let code = r#"use std::fmt;

pub struct Point {
    x: i32,
    y: i32,
}

impl Point {
    fn origin() -> Self {
        Self { x: 0, y: 0 }
    }
}

fn helper(value: i32) -> i32 {
    value * 2
}
"#;

        let compressed = compressor.compress(code, "rs");

        assert!(compressed.contains("pub struct Point { ... }"));
        assert!(compressed.contains("fn helper(value: i32) -> i32 { ... }"));
        assert!(compressed.contains("lines elided"));
        assert!(line_count(&compressed) < line_count(code));
    }

    #[test]
    fn test_python_signatures_extracted() {
        let compressor = Compressor::new(false);
        let code = "import os\n\nclass Runner:\n    def start(self):\n        pass\n\ndef main():\n    run()\n\ndef helper():\n    pass\n";

        let compressed = compressor.compress(code, "py");

        assert!(compressed.contains("class Runner: ..."));
        assert!(compressed.contains("def main(): ..."));
        assert!(line_count(&compressed) < line_count(code));
    }

    #[test]
    fn test_signature_lines_carry_line_numbers() {
        let compressor = Compressor::new(false);
        let code = "fn a() {}\nfn b() {}\nfn c() {}\n";

        let compressed = compressor.compress(code, "rs");

        assert!(compressed.contains("1: fn a() {}"));
        assert!(compressed.contains("3: fn c() {}"));
    }

    #[test]
    fn test_data_file_falls_back_to_truncation() {
        let compressor = Compressor::new(false);
        let data = (0..200)
            .map(|i| format!("row,{i},value"))
            .collect::<Vec<_>>()
            .join("\n");

        let compressed = compressor.compress(&data, "csv");

        assert!(compressed.contains("lines omitted"));
        assert!(compressed.contains("row,0,value"));
        assert!(compressed.contains("row,199,value"));
        assert!(line_count(&compressed) < 200);
    }

    #[test]
    fn test_too_few_signatures_falls_back() {
        let compressor = Compressor::new(false);
        // One recognizable declaration among plain text.
        let mut lines = vec!["fn only() {}".to_string()];
        lines.extend((0..150).map(|i| format!("  data {i}")));
        let content = lines.join("\n");

        let compressed = compressor.compress(&content, "rs");
        assert!(compressed.contains("lines omitted"));
    }

    #[test]
    fn test_strip_comments_pass() {
        let compressor = Compressor::new(true);
        let code = "// leading comment\nfn a() {} // trailing\n/* block\ncomment */\nfn b() {}\nfn c() {}\n";

        let compressed = compressor.compress(code, "rs");

        assert!(!compressed.contains("leading comment"));
        assert!(!compressed.contains("trailing"));
        assert!(!compressed.contains("block"));
        assert!(compressed.contains("fn a() {}"));
    }

    #[test]
    fn test_strip_preserves_markers_in_strings() {
        let stripped = strip_trailing_comment(
            r#"let url = "https://example.com"; // real comment"#,
            "//",
        );
        assert!(stripped.contains("https://example.com"));
        assert!(!stripped.contains("real comment"));
    }

    #[test]
    fn test_python_docstrings_stripped() {
        let code = "def f():\n    pass\n\"\"\"\nmodule docs\n\"\"\"\ncode = 1\n";
        let stripped = strip_comment_lines(code, &PYTHON_RULES);

        assert!(!stripped.contains("module docs"));
        assert!(stripped.contains("code = 1"));
    }

    #[test]
    fn test_compression_strictly_shorter() {
        let compressor = Compressor::new(false);
        for total in [3usize, 10, 61, 62, 500] {
            let content = (0..total)
                .map(|i| format!("line {i}"))
                .collect::<Vec<_>>()
                .join("\n");
            let compressed = compressor.compress(&content, "txt");
            assert!(
                line_count(&compressed) < total,
                "not shorter for {total} lines"
            );
        }
    }

    #[test]
    fn test_head_tail_truncate_small_inputs() {
        assert_eq!(head_tail_truncate("only", 30), "only");
        assert_eq!(head_tail_truncate("a\nb", 30), "a");

        let out = head_tail_truncate("a\nb\nc", 30);
        assert!(out.starts_with('a'));
        assert!(out.contains("omitted"));
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn test_unknown_extension_uses_plain_rules() {
        let rules = rules_for("xyz");
        assert!(!rules.extract_signatures);
        assert!(rules.line_comment.is_none());
    }
}
