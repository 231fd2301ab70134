//! Hole plugging: every directory gets an index page.
//!
//! For each directory node the file children are compared by lower-cased
//! stem:
//!
//! | Children contain        | Action                                        |
//! |-------------------------|-----------------------------------------------|
//! | `index.*`               | nothing                                       |
//! | `readme.*` but no index | [`PlugAction::PromoteReadme`]: written as `index.html` |
//! | neither                 | [`PlugAction::InjectIndex`]: synthetic `index.md` |
//!
//! Planning is pure ([`plan`]); [`apply`] mutates the tree and the document
//! store. Injected indexes start empty and are filled with a link listing by
//! [`build_index_listing`] once every directory has been plugged.

use crate::naming;
use crate::store::{DocumentStore, set_if_absent};
use crate::tree::{NodeKey, Tree};
use crate::write;
use std::path::{Component, Path, PathBuf};

const INDEX_STEM: &str = "index";
const README_STEM: &str = "readme";
const INDEX_SOURCE: &str = "index.md";
const INDEX_HTML: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlugAction {
    /// Write the directory's readme as its index.
    PromoteReadme { dir: NodeKey, file: String },
    /// Create a synthetic index document for the directory.
    InjectIndex { dir: NodeKey },
}

impl PlugAction {
    pub fn dir(&self) -> &NodeKey {
        match self {
            PlugAction::PromoteReadme { dir, .. } | PlugAction::InjectIndex { dir } => dir,
        }
    }
}

/// What [`apply`] changed.
#[derive(Debug, Default, Clone)]
pub struct PlugOutcome {
    pub promoted: Vec<PathBuf>,
    pub injected: Vec<PathBuf>,
}

/// Decide the action for every directory, root included.
pub fn plan(tree: &Tree) -> Vec<PlugAction> {
    tree.directories()
        .filter_map(|(key, node)| plan_directory(key, node.file_children.iter()))
        .collect()
}

/// Decide the action for one directory from its file-child names.
pub fn plan_directory<'a>(
    dir: &[String],
    file_children: impl IntoIterator<Item = &'a String>,
) -> Option<PlugAction> {
    let mut readme: Option<&String> = None;
    for name in file_children {
        match naming::normalize_stem(name).as_str() {
            INDEX_STEM => return None,
            README_STEM if readme.is_none() => readme = Some(name),
            _ => {}
        }
    }
    Some(match readme {
        Some(file) => PlugAction::PromoteReadme {
            dir: dir.to_vec(),
            file: file.clone(),
        },
        None => PlugAction::InjectIndex { dir: dir.to_vec() },
    })
}

/// Apply planned actions to the tree and store.
///
/// `root_title` names the index injected at the root; other injected
/// indexes are titled after their directory.
pub fn apply(
    actions: &[PlugAction],
    tree: &mut Tree,
    store: &mut DocumentStore,
    root_title: &str,
) -> PlugOutcome {
    let mut outcome = PlugOutcome::default();

    for action in actions {
        match action {
            PlugAction::PromoteReadme { dir, file } => {
                let mut key = dir.clone();
                key.push(file.clone());
                tree.rename(&key, INDEX_HTML);

                let source = tree.source_path(&key);
                let doc = store.entry(&source);
                if doc.meta_values("destination_filename").is_none() {
                    doc.destination_filename = Some(PathBuf::from(INDEX_HTML));
                }
                tracing::debug!(path = %source.display(), "readme promoted to index");
                outcome.promoted.push(source);
            }
            PlugAction::InjectIndex { dir } => {
                let mut key = dir.clone();
                key.push(INDEX_SOURCE.to_string());
                let rel: PathBuf = key.iter().collect();
                let Some(key) = tree.insert_path(&rel) else {
                    continue;
                };

                let source = tree.source_path(&key);
                let title = dir.last().cloned().unwrap_or_else(|| root_title.to_string());
                let dest_dir: PathBuf = dir.iter().collect();

                let doc = store.insert_synthetic(&source, &rel);
                set_if_absent(&mut doc.title, title);
                set_if_absent(&mut doc.destination_filename, PathBuf::from(INDEX_HTML));
                set_if_absent(&mut doc.destination_dirs, vec![dest_dir]);
                tracing::debug!(path = %source.display(), "index injected");
                outcome.injected.push(source);
            }
        }
    }

    outcome
}

/// Fill every synthetic index with a markdown list linking its directory's children.
///
/// Links are relative to the directory the index is written to. Subdirectories
/// link to their own `index.html`; files link to their first destination and
/// show their title. Returns the number of indexes filled.
pub fn build_index_listing(tree: &Tree, store: &mut DocumentStore) -> usize {
    let mut filled = 0;

    for (dir_key, _) in tree.directories() {
        let mut index_key = dir_key.clone();
        index_key.push(INDEX_SOURCE.to_string());
        let index_source = tree.source_path(&index_key);
        let Some(index) = store.get(&index_source).filter(|d| d.is_synthetic()) else {
            continue;
        };
        let dir_path: PathBuf = dir_key.iter().collect();
        let index_dir = index
            .destination_dirs
            .as_ref()
            .and_then(|dirs| dirs.first().cloned())
            .unwrap_or_else(|| dir_path.clone());

        let lines: Vec<String> = tree
            .child_keys(dir_key)
            .into_iter()
            .filter(|child| *child != index_key)
            .filter_map(|child| {
                let node = tree.get(&child)?;
                if node.is_dir() {
                    let href = relative_link(&index_dir, &dir_path.join(&node.name), INDEX_HTML);
                    return Some(listing_line(&node.name, &href));
                }
                let doc = store.get(&tree.source_path(&child))?;
                let target_dir = match &doc.destination_dirs {
                    Some(dirs) => dirs.first().cloned()?,
                    None if doc.meta_values("destination_dirs").is_some() => {
                        write::destination_dirs(doc).first().cloned()?
                    }
                    None => dir_path.clone(),
                };
                let filename = tree
                    .renamed(&child)
                    .map(String::from)
                    .or_else(|| {
                        doc.destination_filename
                            .as_ref()
                            .map(|p| p.to_string_lossy().into_owned())
                    })
                    .unwrap_or_else(|| write::destination_filename(doc).to_string_lossy().into_owned());
                let title = doc.title.clone().unwrap_or_else(|| node.name.clone());
                Some(listing_line(&title, &relative_link(&index_dir, &target_dir, &filename)))
            })
            .collect();

        if let Some(doc) = store.get_mut(&index_source) {
            let content = doc.content.get_or_insert_with(String::new);
            if content.is_empty() {
                *content = lines.join("\n");
                filled += 1;
            }
        }
    }

    filled
}

/// Path from directory `from` to `filename` inside directory `to`, `/`-separated.
fn relative_link(from: &Path, to: &Path, filename: &str) -> String {
    let from = normal_segments(from);
    let to = normal_segments(to);
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(to[common..].iter().cloned());
    parts.push(filename.to_string());
    parts.join("/")
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(seg.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// One markdown list item. The listing is rendered as an inline template
/// and as markdown, so braces are turned into entities and markdown
/// punctuation is backslash-escaped.
fn listing_line(title: &str, href: &str) -> String {
    format!("- [{}](<{}>)", escape_link_text(title), escape_link_target(href))
}

fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            '\\' | '[' | ']' | '*' | '_' | '`' | '<' | '>' | '&' | '!' | '#' | '|' | '~' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn escape_link_target(href: &str) -> String {
    let mut out = String::with_capacity(href.len());
    for ch in href.chars() {
        match ch {
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '{' => out.push_str("%7B"),
            '}' => out.push_str("%7D"),
            '\\' => out.push_str("%5C"),
            _ => out.push(ch),
        }
    }
    out
}
