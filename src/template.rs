//! Markdown rendering of a selection result.
//!
//! The renderer is thin formatting glue over the pipeline's output: it never
//! influences which files were selected, only how they are presented.

use crate::{
    config::Config,
    error::{Error, Result},
    pipeline::{SelectionResult, SelectionStats},
};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

static LANGUAGE_TAGS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("rs", "rust"),
        ("py", "python"),
        ("pyi", "python"),
        ("js", "javascript"),
        ("mjs", "javascript"),
        ("ts", "typescript"),
        ("jsx", "jsx"),
        ("tsx", "tsx"),
        ("go", "go"),
        ("java", "java"),
        ("kt", "kotlin"),
        ("c", "c"),
        ("h", "c"),
        ("cpp", "cpp"),
        ("cc", "cpp"),
        ("hpp", "cpp"),
        ("cs", "csharp"),
        ("rb", "ruby"),
        ("php", "php"),
        ("swift", "swift"),
        ("scala", "scala"),
        ("sh", "bash"),
        ("bash", "bash"),
        ("html", "html"),
        ("css", "css"),
        ("scss", "scss"),
        ("xml", "xml"),
        ("json", "json"),
        ("yaml", "yaml"),
        ("yml", "yaml"),
        ("toml", "toml"),
        ("md", "markdown"),
        ("sql", "sql"),
    ]
    .into_iter()
    .collect()
});

#[derive(Serialize)]
struct DocumentContext<'a> {
    project_name: String,
    project_root: String,
    generated_at: String,
    include_instructions: bool,
    structure: Option<String>,
    dependencies: Vec<String>,
    files: Vec<FileSection<'a>>,
    stats: &'a SelectionStats,
}

#[derive(Serialize)]
struct FileSection<'a> {
    path: &'a str,
    language: &'static str,
    line_count: usize,
    byte_size: u64,
    was_compressed: bool,
    was_truncated: bool,
    content: &'a str,
}

/// Renders a [`SelectionResult`] into a Markdown document.
pub struct Renderer {
    tera: Tera,
    root_dir: PathBuf,
    include_structure: bool,
    include_dependencies: bool,
    include_instructions: bool,
}

impl Renderer {
    /// Creates a new renderer from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if template registration fails.
    pub fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template("markdown", include_str!("../templates/markdown.tera"))
            .map_err(|e| Error::template("markdown", e))?;

        Ok(Self {
            tera,
            root_dir: config.root_dir.clone(),
            include_structure: config.include_structure,
            include_dependencies: config.include_dependencies,
            include_instructions: config.include_instructions,
        })
    }

    /// Renders the selection into the final document.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render(&self, result: &SelectionResult) -> Result<String> {
        let files: Vec<FileSection<'_>> = result
            .selected
            .iter()
            .map(|file| FileSection {
                path: &file.record.relative_path,
                language: language_tag(&file.record.extension),
                line_count: file.line_count,
                byte_size: file.byte_size,
                was_compressed: file.was_compressed,
                was_truncated: file.was_truncated,
                content: &file.content,
            })
            .collect();

        let project_name = self
            .root_dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| self.root_dir.display().to_string());

        let structure = self.include_structure.then(|| {
            let paths: Vec<&str> = result
                .selected
                .iter()
                .map(|f| f.record.relative_path.as_str())
                .collect();
            build_tree(&paths, &project_name)
        });

        let dependencies = if self.include_dependencies {
            extract_dependencies(&self.root_dir)
        } else {
            Vec::new()
        };

        let context = DocumentContext {
            project_name,
            project_root: self.root_dir.display().to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            include_instructions: self.include_instructions,
            structure,
            dependencies,
            files,
            stats: &result.stats,
        };

        let mut tera_context = Context::new();
        tera_context.insert("ctx", &context);

        self.tera
            .render("markdown", &tera_context)
            .map_err(|e| Error::template("markdown", e))
    }
}

/// Markdown fence tag for an extension, empty when unknown.
fn language_tag(extension: &str) -> &'static str {
    LANGUAGE_TAGS.get(extension).copied().unwrap_or("")
}

#[derive(Default)]
struct TreeNode {
    dirs: BTreeMap<String, TreeNode>,
    files: BTreeSet<String>,
}

/// Builds a box-drawing tree view of the selected relative paths.
fn build_tree(paths: &[&str], root_name: &str) -> String {
    let mut root = TreeNode::default();

    for path in paths {
        let mut node = &mut root;
        let mut parts = path.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                node = node.dirs.entry(part.to_string()).or_default();
            } else {
                node.files.insert(part.to_string());
            }
        }
    }

    let mut lines = vec![format!("{root_name}/")];
    render_node(&root, "", &mut lines);
    lines.join("\n")
}

fn render_node(node: &TreeNode, prefix: &str, lines: &mut Vec<String>) {
    let total = node.dirs.len() + node.files.len();
    let mut index = 0;

    for (name, child) in &node.dirs {
        index += 1;
        let is_last = index == total;
        lines.push(format!(
            "{prefix}{}{name}/",
            if is_last { "└── " } else { "├── " }
        ));
        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        render_node(child, &child_prefix, lines);
    }

    for name in &node.files {
        index += 1;
        let is_last = index == total;
        lines.push(format!(
            "{prefix}{}{name}",
            if is_last { "└── " } else { "├── " }
        ));
    }
}

/// Collects dependency names from recognized manifests at the root.
///
/// Recognizes `Cargo.toml` dependency tables, `requirements.txt` lines and
/// `package.json` dependency keys. Unreadable or malformed manifests are
/// silently skipped; this section is informational only.
fn extract_dependencies(root: &Path) -> Vec<String> {
    let mut deps = Vec::new();

    if let Ok(content) = fs::read_to_string(root.join("Cargo.toml")) {
        deps.extend(parse_cargo_dependencies(&content));
    }

    if let Ok(content) = fs::read_to_string(root.join("requirements.txt")) {
        deps.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }

    if let Ok(content) = fs::read_to_string(root.join("package.json")) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
            if let Some(map) = value.get("dependencies").and_then(|d| d.as_object()) {
                deps.extend(map.iter().map(|(name, version)| {
                    format!("{name} {}", version.as_str().unwrap_or("")).trim_end().to_string()
                }));
            }
        }
    }

    deps
}

fn parse_cargo_dependencies(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    let mut in_dependency_table = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_dependency_table = matches!(
                trimmed,
                "[dependencies]" | "[dev-dependencies]" | "[build-dependencies]"
            );
            continue;
        }
        if in_dependency_table && !trimmed.is_empty() && !trimmed.starts_with('#') {
            if let Some((name, _)) = trimmed.split_once('=') {
                deps.push(name.trim().to_string());
            }
        }
    }

    deps
}
