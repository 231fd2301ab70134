//! Per-unit document store.
//!
//! One [`Document`] per source file, keyed by absolute source path. Records
//! are created empty the first time a stage references a path and then gain
//! facts stage by stage. A store belongs to exactly one build unit and is
//! dropped with it; nothing is ever removed during a build.
//!
//! ## Write discipline
//!
//! Fields owned by the extraction and destination stages are filled with
//! [`set_if_absent`], so a value placed by an earlier stage (or by a
//! utility that ran first) is never silently replaced. The render stage is
//! the exception: it replaces `rendered_markdown`, `rendered_content` and
//! `rendered_html` on every render.

use crate::metadata::{self, Metadata};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Store `value` into `slot` unless the slot is already filled.
///
/// Returns `true` when the value was stored.
pub fn set_if_absent<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Read from a file under the build root.
    Source,
    /// Injected by the hole plugger; no file exists on disk.
    Synthetic,
}

/// Accumulated facts about one document.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub source_path: PathBuf,
    pub origin: Origin,
    /// Part of the rendered site (extracted or injected).
    pub is_file: bool,
    /// Body text with the metadata header removed.
    pub content: Option<String>,
    pub meta: Option<Metadata>,
    /// Path relative to the build root.
    pub rel_path: Option<PathBuf>,
    pub title: Option<String>,
    pub destination_filename: Option<PathBuf>,
    pub destination_dirs: Option<Vec<PathBuf>>,
    /// Every output path this document is written to.
    pub destination_paths: Vec<PathBuf>,
    pub markdown_template: Option<String>,
    pub page_template: Option<String>,
    /// Output of the markdown-template pass, before inline re-rendering.
    pub rendered_markdown: Option<String>,
    /// HTML converted from the fully templated markdown.
    pub rendered_content: Option<String>,
    /// Final page HTML.
    pub rendered_html: Option<String>,
}

impl Document {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            origin: Origin::Source,
            is_file: false,
            content: None,
            meta: None,
            rel_path: None,
            title: None,
            destination_filename: None,
            destination_dirs: None,
            destination_paths: Vec::new(),
            markdown_template: None,
            page_template: None,
            rendered_markdown: None,
            rendered_content: None,
            rendered_html: None,
        }
    }

    /// A document with no backing file, such as an injected index page.
    pub fn synthetic(source_path: impl Into<PathBuf>, rel_path: impl Into<PathBuf>) -> Self {
        Self {
            origin: Origin::Synthetic,
            is_file: true,
            content: Some(String::new()),
            meta: Some(Metadata::new()),
            rel_path: Some(rel_path.into()),
            ..Self::new(source_path)
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == Origin::Synthetic
    }

    /// Raw values for a metadata key, if present and non-empty.
    pub fn meta_values(&self, key: &str) -> Option<&[String]> {
        self.meta
            .as_ref()
            .and_then(|m| m.get(key))
            .map(Vec::as_slice)
            .filter(|v| v.iter().any(|s| !s.trim().is_empty()))
    }

    /// Metadata value joined into one string (`title`, `template`, ...).
    pub fn meta_str(&self, key: &str) -> Option<String> {
        self.meta_values(key).map(metadata::joined)
    }

    /// Metadata value expanded into a list (`destination_dirs`, ...).
    pub fn meta_list(&self, key: &str) -> Option<Vec<String>> {
        self.meta_values(key)
            .map(metadata::expand_list)
            .filter(|v| !v.is_empty())
    }
}

/// All documents of one build unit.
#[derive(Debug, Default)]
pub struct DocumentStore {
    owner: String,
    documents: BTreeMap<PathBuf, Document>,
}

impl DocumentStore {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            documents: BTreeMap::new(),
        }
    }

    /// Name of the unit this store belongs to (for narration).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The record for `path`, created empty on first reference.
    pub fn entry(&mut self, path: &Path) -> &mut Document {
        self.documents
            .entry(path.to_path_buf())
            .or_insert_with(|| Document::new(path))
    }

    /// Insert a synthetic document, keeping an existing record if one is present.
    pub fn insert_synthetic(&mut self, path: &Path, rel_path: &Path) -> &mut Document {
        self.documents
            .entry(path.to_path_buf())
            .or_insert_with(|| Document::synthetic(path, rel_path))
    }

    pub fn get(&self, path: &Path) -> Option<&Document> {
        self.documents.get(path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Document> {
        self.documents.get_mut(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut()
    }

    /// Documents that belong to the rendered site.
    pub fn files(&self) -> impl Iterator<Item = &Document> {
        self.documents.values().filter(|d| d.is_file)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
