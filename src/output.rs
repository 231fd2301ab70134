//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Documents are shown by their title with the source path as secondary
//! context on an indented `Source:` line, so the output reads as a content
//! inventory while still pointing back at files.
//!
//! # Output Format
//!
//! ## Discovery
//!
//! ```text
//! Documents (docs)
//! 001 Getting Started
//!     Source: getting-started.md
//! 002 install
//!     Source: guide/install.md
//! Skipped
//!     notes.md: stream did not contain valid UTF-8
//! ```
//!
//! ## Index plan and tree
//!
//! ```text
//! Index plan
//!     ./ ← index.md (injected)
//!     guide/ ← README.md (promoted)
//!
//! ./
//!     getting-started.md
//!     guide/
//!         README.md → index.html
//!         install.md
//!     index.md
//! ```
//!
//! ## Summary
//!
//! ```text
//! docs: 6 documents (1 injected) → site
//!     Written: 7
//!     Failed: broken.md → site/broken.html: Template "missing.html" not found
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions do no I/O.

use crate::pipeline::BuildSummary;
use crate::plug::PlugAction;
use crate::scan::SkippedFile;
use crate::store::DocumentStore;
use crate::tree::Tree;
use crate::write::WriteReport;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Show `path` relative to `root` when given and possible.
fn display_path(path: &Path, root: Option<&Path>) -> String {
    root.and_then(|r| path.strip_prefix(r).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Directory key as `a/b/`, root as `./`.
fn dir_label(dir: &[String]) -> String {
    if dir.is_empty() {
        "./".to_string()
    } else {
        format!("{}/", dir.join("/"))
    }
}

// ============================================================================
// Discovery
// ============================================================================

pub fn format_discovery(
    unit: &str,
    store: &DocumentStore,
    skipped: &[SkippedFile],
    relative_to: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![format!("Documents ({unit})")];
    for (i, doc) in store.files().enumerate() {
        let title = doc
            .title
            .clone()
            .or_else(|| doc.meta_str("title"))
            .unwrap_or_else(|| crate::naming::display_stem(&doc.source_path));
        lines.push(format!("{} {}", format_index(i + 1), title));
        lines.push(format!(
            "{}Source: {}",
            indent(1),
            display_path(&doc.source_path, relative_to)
        ));
    }
    if !skipped.is_empty() {
        lines.push("Skipped".to_string());
        for skip in skipped {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                display_path(&skip.path, relative_to),
                skip.reason
            ));
        }
    }
    lines
}

pub fn print_discovery(
    unit: &str,
    store: &DocumentStore,
    skipped: &[SkippedFile],
    relative_to: Option<&Path>,
) {
    for line in format_discovery(unit, store, skipped, relative_to) {
        println!("{}", line);
    }
}

// ============================================================================
// Plug plan and tree
// ============================================================================

pub fn format_plug_actions(actions: &[PlugAction]) -> Vec<String> {
    let mut lines = vec!["Index plan".to_string()];
    if actions.is_empty() {
        lines.push(format!("{}every directory has an index", indent(1)));
    }
    for action in actions {
        let line = match action {
            PlugAction::PromoteReadme { dir, file } => {
                format!("{}{} ← {} (promoted)", indent(1), dir_label(dir), file)
            }
            PlugAction::InjectIndex { dir } => {
                format!("{}{} ← index.md (injected)", indent(1), dir_label(dir))
            }
        };
        lines.push(line);
    }
    lines
}

pub fn print_plug_actions(actions: &[PlugAction]) {
    for line in format_plug_actions(actions) {
        println!("{}", line);
    }
}

/// Indented tree; directories end in `/`, renamed files show their output name.
pub fn format_tree(tree: &Tree) -> Vec<String> {
    tree.iter()
        .map(|(key, node)| {
            if key.is_empty() {
                return "./".to_string();
            }
            let name = if node.is_dir() {
                format!("{}/", node.name)
            } else {
                node.name.clone()
            };
            match tree.renamed(key) {
                Some(dest) => format!("{}{} → {}", indent(node.depth), name, dest),
                None => format!("{}{}", indent(node.depth), name),
            }
        })
        .collect()
}

pub fn print_tree(tree: &Tree) {
    for line in format_tree(tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Write report and summary
// ============================================================================

pub fn format_write_report(report: &WriteReport, relative_to: Option<&Path>) -> Vec<String> {
    let mut lines = vec![format!("{}Written: {}", indent(1), report.written.len())];
    if !report.skipped.is_empty() {
        lines.push(format!(
            "{}Skipped (no extension): {}",
            indent(1),
            report.skipped.len()
        ));
    }
    for failure in &report.failures {
        lines.push(format!(
            "{}Failed: {} → {}: {}",
            indent(1),
            display_path(&failure.source, relative_to),
            display_path(&failure.target, relative_to),
            failure.reason
        ));
    }
    lines
}

pub fn format_summary(summary: &BuildSummary) -> Vec<String> {
    let output = summary
        .output_dirs
        .iter()
        .map(|d| display_path(d, Some(summary.root.as_path())))
        .collect::<Vec<_>>()
        .join(", ");
    let mut lines = vec![format!(
        "{}: {} documents ({} injected) → {}",
        summary.name, summary.documents, summary.synthetic, output
    )];
    for skip in &summary.skipped {
        lines.push(format!(
            "{}Unreadable: {}: {}",
            indent(1),
            display_path(&skip.path, Some(summary.root.as_path())),
            skip.reason
        ));
    }
    for failure in &summary.render_failures {
        lines.push(format!(
            "{}Render failed: {}: {}",
            indent(1),
            display_path(&failure.source, Some(summary.root.as_path())),
            failure.reason
        ));
    }
    lines.extend(format_write_report(&summary.write, Some(summary.root.as_path())));
    lines
}

pub fn print_summary(summary: &BuildSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderFailure;
    use crate::write::WriteFailure;
    use std::path::PathBuf;

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_is_four_spaces_per_level() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn discovery_lists_titles_with_relative_sources() {
        let mut store = DocumentStore::new("docs");
        let doc = store.entry(Path::new("/docs/guide/intro.md"));
        doc.is_file = true;
        doc.title = Some("Introduction".into());
        store.entry(Path::new("/docs/notes.md")).is_file = true;

        let skipped = vec![SkippedFile {
            path: PathBuf::from("/docs/bad.md"),
            reason: "invalid UTF-8".into(),
        }];
        let lines = format_discovery("docs", &store, &skipped, Some(Path::new("/docs")));
        assert_eq!(
            lines,
            vec![
                "Documents (docs)",
                "001 Introduction",
                "    Source: guide/intro.md",
                "002 notes",
                "    Source: notes.md",
                "Skipped",
                "    bad.md: invalid UTF-8",
            ]
        );
    }

    #[test]
    fn discovery_absolute_paths_when_not_relative() {
        let mut store = DocumentStore::new("docs");
        store.entry(Path::new("/docs/a.md")).is_file = true;
        let lines = format_discovery("docs", &store, &[], None);
        assert_eq!(lines[2], "    Source: /docs/a.md");
    }

    #[test]
    fn plug_actions_show_directory_and_action() {
        let actions = vec![
            PlugAction::InjectIndex { dir: vec![] },
            PlugAction::PromoteReadme {
                dir: vec!["guide".into()],
                file: "README.md".into(),
            },
        ];
        assert_eq!(
            format_plug_actions(&actions),
            vec![
                "Index plan",
                "    ./ ← index.md (injected)",
                "    guide/ ← README.md (promoted)",
            ]
        );
    }

    #[test]
    fn empty_plan_says_so() {
        assert_eq!(
            format_plug_actions(&[]),
            vec!["Index plan", "    every directory has an index"]
        );
    }

    #[test]
    fn tree_is_indented_by_depth() {
        let mut tree = Tree::build(
            Path::new("/docs"),
            ["guide/README.md", "guide/install.md", "top.md"].map(Path::new),
        );
        tree.rename(&["guide".to_string(), "README.md".to_string()], "index.html");
        assert_eq!(
            format_tree(&tree),
            vec![
                "./",
                "    guide/",
                "        README.md → index.html",
                "        install.md",
                "    top.md",
            ]
        );
    }

    #[test]
    fn summary_lists_failures() {
        let summary = BuildSummary {
            name: "docs".into(),
            root: PathBuf::from("/docs"),
            output_dirs: vec![PathBuf::from("/docs/site")],
            documents: 3,
            synthetic: 1,
            skipped: vec![],
            render_failures: vec![RenderFailure {
                source: PathBuf::from("/docs/broken.md"),
                reason: "missing template".into(),
            }],
            write: WriteReport {
                written: vec![PathBuf::from("/docs/site/index.html")],
                skipped: vec![],
                failures: vec![WriteFailure {
                    source: PathBuf::from("/docs/broken.md"),
                    target: PathBuf::from("/docs/site/broken.html"),
                    reason: "no rendered output".into(),
                }],
            },
        };
        assert_eq!(
            format_summary(&summary),
            vec![
                "docs: 3 documents (1 injected) → site",
                "    Render failed: broken.md: missing template",
                "    Written: 1",
                "    Failed: broken.md → site/broken.html: no rendered output",
            ]
        );
    }
}
