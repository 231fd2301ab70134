//! Destination resolution and site writing.
//!
//! A document is written once per (output root × destination directory):
//!
//! ```text
//! destination_dirs: [a/, b/]          roots: site/, mirror/
//!
//!   site/a/page.html    site/b/page.html
//!   mirror/a/page.html  mirror/b/page.html
//! ```
//!
//! Destination directories only keep plain path components and file names
//! only keep their last one, so a document can never be written outside its
//! output root. Failures are collected into
//! a [`WriteReport`] and never stop the batch.

use crate::naming;
use crate::store::Document;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Output file name: the metadata override's final name component, else the
/// slugged source stem plus `.html`.
pub fn destination_filename(doc: &Document) -> PathBuf {
    if let Some(name) = doc.meta_str("destination_filename") {
        match sanitize_filename(Path::new(&name)) {
            Some(clean) if clean.as_os_str() == name.as_str() => return clean,
            Some(clean) => {
                tracing::warn!(
                    path = %doc.source_path.display(),
                    requested = %name,
                    used = %clean.display(),
                    "destination_filename reduced to a plain file name"
                );
                return clean;
            }
            None => tracing::warn!(
                path = %doc.source_path.display(),
                requested = %name,
                "destination_filename has no usable file name, using the default"
            ),
        }
    }
    let source_name = doc
        .source_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    PathBuf::from(naming::html_filename(&source_name))
}

/// Output directories: metadata override, else the document's relative parent directory.
pub fn destination_dirs(doc: &Document) -> Vec<PathBuf> {
    if let Some(dirs) = doc.meta_list("destination_dirs") {
        return dirs.iter().map(|d| sanitize_dir(Path::new(d))).collect();
    }
    let parent = doc
        .rel_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new(""));
    vec![sanitize_dir(parent)]
}

/// Keep only normal components of a destination directory.
pub fn sanitize_dir(dir: &Path) -> PathBuf {
    dir.components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(seg),
            _ => None,
        })
        .collect()
}

/// Last normal component of a file name, or `None` when there is none.
pub fn sanitize_filename(name: &Path) -> Option<PathBuf> {
    name.components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(seg),
            _ => None,
        })
        .next_back()
        .map(PathBuf::from)
}

/// Every write target for a document, in order, without duplicates.
///
/// Directories and the file name are sanitized again here, so values seeded
/// directly on a document cannot leave the output roots either.
pub fn destination_targets(roots: &[PathBuf], dirs: &[PathBuf], filename: &Path) -> Vec<PathBuf> {
    let Some(filename) = sanitize_filename(filename) else {
        return Vec::new();
    };
    let mut targets: Vec<PathBuf> = Vec::with_capacity(roots.len() * dirs.len());
    for root in roots {
        for dir in dirs {
            let target = root.join(sanitize_dir(dir)).join(&filename);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
    targets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Written,
    /// The target has no file extension and is treated as a directory.
    SkippedNoExtension,
}

/// Writes rendered pages to disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteWriter;

impl SiteWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write `text` to `target`, creating parent directories.
    pub fn write(&self, target: &Path, text: &str) -> Result<WriteStatus, WriteError> {
        if target.extension().is_none() {
            tracing::debug!(path = %target.display(), "no extension, not a file target");
            return Ok(WriteStatus::SkippedNoExtension);
        }
        let io_err = |source| WriteError::Io {
            path: target.to_path_buf(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(target, text).map_err(io_err)?;
        tracing::debug!(path = %target.display(), "written");
        Ok(WriteStatus::Written)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteFailure {
    pub source: PathBuf,
    pub target: PathBuf,
    pub reason: String,
}

/// Outcome of the write stage.
#[derive(Debug, Default, Clone, Serialize)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<WriteFailure>,
}

impl WriteReport {
    /// Write one document to all of its targets, recording each outcome.
    pub fn write_document(&mut self, writer: &SiteWriter, source: &Path, targets: &[PathBuf], text: &str) {
        for target in targets {
            match writer.write(target, text) {
                Ok(WriteStatus::Written) => self.written.push(target.clone()),
                Ok(WriteStatus::SkippedNoExtension) => self.skipped.push(target.clone()),
                Err(e) => {
                    tracing::warn!(source = %source.display(), error = %e, "write failed");
                    self.failures.push(WriteFailure {
                        source: source.to_path_buf(),
                        target: target.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Record a document that could not be written at all (e.g. it failed to render).
    pub fn record_failure(&mut self, source: &Path, target: PathBuf, reason: impl Into<String>) {
        self.failures.push(WriteFailure {
            source: source.to_path_buf(),
            target,
            reason: reason.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use tempfile::TempDir;

    /// Repeated keys append, like continuation lines in a header.
    fn doc_with_meta(source: &str, rel: &str, meta: &[(&str, &str)]) -> Document {
        let mut doc = Document::new(source);
        doc.rel_path = Some(PathBuf::from(rel));
        let mut m = Metadata::new();
        for (k, v) in meta {
            m.entry(k.to_string()).or_default().push(v.to_string());
        }
        doc.meta = Some(m);
        doc
    }

    #[test]
    fn filename_defaults_to_slugged_stem() {
        let doc = doc_with_meta("/docs/guide/My File Name!.md", "guide/My File Name!.md", &[]);
        assert_eq!(destination_filename(&doc), PathBuf::from("my-file-name.html"));
    }

    #[test]
    fn filename_override_is_verbatim() {
        let doc = doc_with_meta("/docs/a.md", "a.md", &[("destination_filename", "About Us.htm")]);
        assert_eq!(destination_filename(&doc), PathBuf::from("About Us.htm"));
    }

    #[test]
    fn filename_override_cannot_leave_output_root() {
        let climbing = doc_with_meta(
            "/docs/page.md",
            "page.md",
            &[("destination_filename", "../../escaped.html")],
        );
        assert_eq!(destination_filename(&climbing), PathBuf::from("escaped.html"));

        let absolute = doc_with_meta("/docs/page.md", "page.md", &[("destination_filename", "/etc/x.html")]);
        assert_eq!(destination_filename(&absolute), PathBuf::from("x.html"));

        let nested = doc_with_meta("/docs/page.md", "page.md", &[("destination_filename", "sub/y.html")]);
        assert_eq!(destination_filename(&nested), PathBuf::from("y.html"));
    }

    #[test]
    fn filename_override_without_a_name_falls_back() {
        let doc = doc_with_meta("/docs/page.md", "page.md", &[("destination_filename", "../..")]);
        assert_eq!(destination_filename(&doc), PathBuf::from("page.html"));
    }

    #[test]
    fn seeded_filename_is_sanitized_in_targets() {
        let roots = vec![PathBuf::from("/out/site")];
        let targets = destination_targets(&roots, &[PathBuf::from("../a")], Path::new("../../x.html"));
        assert_eq!(targets, vec![PathBuf::from("/out/site/a/x.html")]);
        assert!(destination_targets(&roots, &[PathBuf::new()], Path::new("..")).is_empty());
    }

    #[test]
    fn dirs_default_to_relative_parent() {
        let doc = doc_with_meta("/docs/guide/install/x.md", "guide/install/x.md", &[]);
        assert_eq!(destination_dirs(&doc), vec![PathBuf::from("guide/install")]);

        let top = doc_with_meta("/docs/x.md", "x.md", &[]);
        assert_eq!(destination_dirs(&top), vec![PathBuf::new()]);
    }

    #[test]
    fn dirs_override_accepts_inline_list_and_continuations() {
        let inline = doc_with_meta("/docs/x.md", "x.md", &[("destination_dirs", "[a/, b/]")]);
        assert_eq!(destination_dirs(&inline), vec![PathBuf::from("a"), PathBuf::from("b")]);

        let lines = doc_with_meta(
            "/docs/x.md",
            "x.md",
            &[("destination_dirs", "other/foo/"), ("destination_dirs", "egg/butter")],
        );
        assert_eq!(
            destination_dirs(&lines),
            vec![PathBuf::from("other/foo"), PathBuf::from("egg/butter")]
        );
    }

    #[test]
    fn dirs_cannot_escape_output_root() {
        assert_eq!(sanitize_dir(Path::new("/etc/../a/./b")), PathBuf::from("etc/a/b"));
    }

    #[test]
    fn two_dirs_and_two_roots_give_four_targets() {
        let doc = doc_with_meta("/docs/page.md", "page.md", &[("destination_dirs", "[a/, b/]")]);
        let roots = vec![PathBuf::from("/out/site"), PathBuf::from("/out/mirror")];
        let targets = destination_targets(&roots, &destination_dirs(&doc), &destination_filename(&doc));

        assert_eq!(
            targets,
            vec![
                PathBuf::from("/out/site/a/page.html"),
                PathBuf::from("/out/site/b/page.html"),
                PathBuf::from("/out/mirror/a/page.html"),
                PathBuf::from("/out/mirror/b/page.html"),
            ]
        );
    }

    #[test]
    fn duplicate_targets_are_collapsed() {
        let roots = vec![PathBuf::from("/out")];
        let dirs = vec![PathBuf::from("a"), PathBuf::from("a")];
        assert_eq!(destination_targets(&roots, &dirs, Path::new("x.html")).len(), 1);
    }

    #[test]
    fn write_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("deep/er/page.html");
        let status = SiteWriter::new().write(&target, "<p>hi</p>").unwrap();
        assert_eq!(status, WriteStatus::Written);
        assert_eq!(fs::read_to_string(target).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn target_without_extension_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("folder");
        let status = SiteWriter::new().write(&target, "x").unwrap();
        assert_eq!(status, WriteStatus::SkippedNoExtension);
        assert!(!target.exists());
    }

    #[test]
    fn failures_are_collected_and_batch_continues() {
        let tmp = TempDir::new().unwrap();
        // A file where a directory is needed makes the first target unwritable.
        fs::write(tmp.path().join("blocked"), "").unwrap();
        let targets = vec![
            tmp.path().join("blocked/page.html"),
            tmp.path().join("ok/page.html"),
            tmp.path().join("dir-only"),
        ];

        let mut report = WriteReport::default();
        report.write_document(&SiteWriter::new(), Path::new("/docs/page.md"), &targets, "x");

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, targets[0]);
        assert_eq!(report.written, vec![targets[1].clone()]);
        assert_eq!(report.skipped, vec![targets[2].clone()]);
        assert!(!report.is_clean());
    }
}
