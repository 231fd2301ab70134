//! Shared test utilities for the doctool test suite.
//!
//! Provides fixture setup, ad-hoc content trees and store lookups.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = write_tree(&[
//!     ("index.md", "title: Home\n\nWelcome"),
//!     ("guide/intro.md", "# Intro"),
//! ]);
//! let mut store = DocumentStore::new("docs");
//! scan::extract_all(tmp.path(), &md(), &scan::discover(tmp.path(), &[]), &mut store);
//!
//! let doc = find_document(&store, tmp.path(), "guide/intro.md");
//! assert_eq!(doc.content.as_deref(), Some("# Intro"));
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::store::{Document, DocumentStore};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/content/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Create a temp directory holding the given `(relative path, content)` files.
pub fn write_tree(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (rel, content) in files {
        let path = tmp.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    tmp
}

/// The default suffix list.
pub fn md() -> Vec<String> {
    vec!["md".to_string()]
}

// =========================================================================
// Lookups
// =========================================================================

/// Find a document by its path relative to `root`. Panics if not found.
pub fn find_document<'a>(store: &'a DocumentStore, root: &Path, rel: &str) -> &'a Document {
    store.get(&root.join(rel)).unwrap_or_else(|| {
        let known: Vec<String> = store
            .iter()
            .map(|d| d.source_path.display().to_string())
            .collect();
        panic!("document '{}' not found. Known: {:?}", rel, known)
    })
}

/// Relative paths of every site file in the store, sorted.
pub fn file_rel_paths(store: &DocumentStore) -> Vec<String> {
    let mut paths: Vec<String> = store
        .files()
        .filter_map(|d| d.rel_path.as_ref())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect();
    paths.sort();
    paths
}

/// Every file under `dir`, relative and sorted (for checking written output).
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}
