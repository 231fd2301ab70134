//! Source discovery and content extraction.
//!
//! First stage of a build. Walks the build root, picks out content files by
//! suffix and fills the [`DocumentStore`] with what each file says about
//! itself.
//!
//! ## Source layout
//!
//! ```text
//! docs/                            # Build root
//! ├── docs.yaml                    # Config (optional)
//! ├── getting-started.md           # Document
//! ├── guide/
//! │   ├── README.md                # Promoted to guide/index.html later
//! │   └── install.md
//! ├── assets/templates/page.html   # Not content: wrong suffix
//! └── site/                        # Output; never scanned
//! ```
//!
//! ## Source format
//!
//! ```text
//! title: Getting Started
//! destination_dirs: [a/, b/]
//!
//! # {{ title }}
//! ```
//!
//! The header is split off by [`metadata::parse_header`]; the body becomes
//! the document's `content`.
//!
//! ## Failure handling
//!
//! Files that cannot be read or are not valid UTF-8 become [`SkippedFile`]s.
//! They are logged and reported, never fatal.

use crate::metadata;
use crate::naming;
use crate::store::{DocumentStore, set_if_absent};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A candidate file that could not be extracted.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Every file under `root`, sorted, skipping anything inside `exclude`.
///
/// Output directories are passed as `exclude` so a site written under its
/// own source root is never read back in. The root itself is always walked,
/// even when it is also an output directory.
pub fn discover(root: &Path, exclude: &[PathBuf]) -> Vec<PathBuf> {
    let (inside, enclosing): (Vec<&PathBuf>, Vec<&PathBuf>) = exclude
        .iter()
        .filter(|ex| ex.starts_with(root) || root.starts_with(ex))
        .partition(|ex| ex.as_path() != root && ex.starts_with(root));
    for ex in enclosing {
        tracing::warn!(
            root = %root.display(),
            output = %ex.display(),
            "output directory contains the source root; not excluded from discovery"
        );
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !inside.iter().any(|ex| e.path().starts_with(ex)))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Whether `path` has one of `suffixes` (ASCII case-insensitive, no dot).
pub fn has_suffix(path: &Path, suffixes: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            suffixes.iter().any(|s| ext.eq_ignore_ascii_case(s))
        })
        .unwrap_or(false)
}

/// Read every matching path and record it in the store.
///
/// Files are read in parallel; the store is filled afterwards in path order.
/// Fields already present on a document are left alone.
pub fn extract_all(
    root: &Path,
    suffixes: &[String],
    paths: &[PathBuf],
    store: &mut DocumentStore,
) -> Vec<SkippedFile> {
    let candidates: Vec<&PathBuf> = paths.iter().filter(|p| has_suffix(p, suffixes)).collect();

    let reads: Vec<(&PathBuf, std::io::Result<String>)> = candidates
        .par_iter()
        .map(|path| (*path, fs::read_to_string(path)))
        .collect();

    let mut skipped = Vec::new();
    for (path, read) in reads {
        let text = match read {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let (meta, body) = metadata::parse_header(&text);
        let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        tracing::debug!(path = %rel.display(), keys = meta.len(), "extracted");

        let doc = store.entry(path);
        doc.is_file = true;
        set_if_absent(&mut doc.content, body);
        set_if_absent(&mut doc.meta, meta);
        set_if_absent(&mut doc.rel_path, rel);
    }
    skipped
}

/// Give every site file a title: the `title` metadata, else the file stem.
pub fn resolve_titles(store: &mut DocumentStore) {
    for doc in store.iter_mut().filter(|d| d.is_file) {
        let meta_title = doc.meta_str("title");
        let stem = naming::display_stem(&doc.source_path);
        if let Some(title) = metadata::resolve(&[meta_title.as_deref(), Some(stem.as_str())]) {
            set_if_absent(&mut doc.title, title);
        }
    }
}
