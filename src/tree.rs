//! Directory/file hierarchy reconstructed from a flat list of document paths.
//!
//! Nodes are keyed by their path segments relative to the build root. The
//! root itself has the empty key.
//!
//! ```text
//! guide/install/linux.md   →   []                          directory
//!                              ["guide"]                   directory
//!                              ["guide","install"]         directory
//!                              ["guide","install","linux.md"]  file
//! ```
//!
//! ## Construction
//!
//! Each path is walked top-down. For prefix length `i` the node keyed by the
//! first `i` segments is looked up or created, as a file only when `i` is the
//! full segment count. The node is then registered with its parent (key minus
//! the last segment), which is created the same way if it does not exist yet.
//! Creation is idempotent, so shared prefixes yield a single node.
//!
//! A key seen both as a file and as a directory prefix keeps whichever kind
//! it was given first and is recorded in [`Tree::conflicts`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

pub type NodeKey = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Number of segments; the root is 0.
    pub depth: usize,
    /// Last segment (empty for the root).
    pub name: String,
    pub rel_path: PathBuf,
    /// Names of immediate children.
    pub children: BTreeSet<String>,
    /// Names of immediate children that are files.
    pub file_children: BTreeSet<String>,
}

impl Node {
    fn new(key: &[String], kind: NodeKind) -> Self {
        Self {
            kind,
            depth: key.len(),
            name: key.last().cloned().unwrap_or_default(),
            rel_path: key.iter().collect(),
            children: BTreeSet::new(),
            file_children: BTreeSet::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    root: PathBuf,
    nodes: BTreeMap<NodeKey, Node>,
    renames: BTreeMap<NodeKey, String>,
    conflicts: BTreeSet<NodeKey>,
}

impl Tree {
    /// An empty tree holding only the root node.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(Vec::new(), Node::new(&[], NodeKind::Directory));
        Self {
            root: root.into(),
            nodes,
            renames: BTreeMap::new(),
            conflicts: BTreeSet::new(),
        }
    }

    /// Build a tree from document paths (absolute under `root`, or relative to it).
    pub fn build<'a>(root: &Path, paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let mut tree = Self::new(root);
        for path in paths {
            tree.insert_path(path);
        }
        tree
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Insert a file path. Returns its key, or `None` when the path lies outside the root.
    pub fn insert_path(&mut self, path: &Path) -> Option<NodeKey> {
        let rel = if path.is_absolute() {
            match path.strip_prefix(&self.root) {
                Ok(rel) => rel,
                Err(_) => {
                    tracing::warn!(path = %path.display(), root = %self.root.display(), "path outside build root ignored");
                    return None;
                }
            }
        } else {
            path
        };

        let Some(key) = key_for(rel) else {
            tracing::warn!(path = %path.display(), "path does not name a file under the root");
            return None;
        };

        for i in 1..=key.len() {
            let kind = if i == key.len() {
                NodeKind::File
            } else {
                NodeKind::Directory
            };
            self.ensure_node(&key[..i], kind);
            self.link_to_parent(&key[..i]);
        }
        Some(key)
    }

    /// Look up or create the node for `key`.
    fn ensure_node(&mut self, key: &[String], kind: NodeKind) {
        match self.nodes.get(key) {
            Some(existing) if existing.kind != kind => {
                if self.conflicts.insert(key.to_vec()) {
                    tracing::warn!(
                        path = %key.join("/"),
                        kept = ?existing.kind,
                        "path is both a file and a directory"
                    );
                }
            }
            Some(_) => {}
            None => {
                self.nodes.insert(key.to_vec(), Node::new(key, kind));
            }
        }
    }

    /// Register `key` with its parent, creating missing ancestors on the way.
    fn link_to_parent(&mut self, key: &[String]) {
        let Some((name, parent_key)) = key.split_last() else {
            return;
        };
        if !self.nodes.contains_key(parent_key) {
            self.ensure_node(parent_key, NodeKind::Directory);
            self.link_to_parent(parent_key);
        }
        let is_file = self.nodes.get(key).is_some_and(Node::is_file);
        if let Some(parent) = self.nodes.get_mut(parent_key) {
            parent.children.insert(name.clone());
            if is_file {
                parent.file_children.insert(name.clone());
            }
        }
    }

    pub fn get(&self, key: &[String]) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &[String]) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// All nodes in key order (parents before their children).
    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &Node)> {
        self.nodes.iter()
    }

    pub fn directories(&self) -> impl Iterator<Item = (&NodeKey, &Node)> {
        self.nodes.iter().filter(|(_, n)| n.is_dir())
    }

    pub fn files(&self) -> impl Iterator<Item = (&NodeKey, &Node)> {
        self.nodes.iter().filter(|(_, n)| n.is_file())
    }

    /// Keys of the immediate children of `key`.
    pub fn child_keys(&self, key: &[String]) -> Vec<NodeKey> {
        self.nodes
            .get(key)
            .map(|node| {
                node.children
                    .iter()
                    .map(|name| {
                        let mut child = key.to_vec();
                        child.push(name.clone());
                        child
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Absolute source path of a node.
    pub fn source_path(&self, key: &[String]) -> PathBuf {
        key.iter().fold(self.root.clone(), |path, seg| path.join(seg))
    }

    /// Record that the node at `key` is written under a different file name.
    pub fn rename(&mut self, key: &[String], destination: impl Into<String>) {
        self.renames.insert(key.to_vec(), destination.into());
    }

    pub fn renamed(&self, key: &[String]) -> Option<&str> {
        self.renames.get(key).map(String::as_str)
    }

    pub fn renames(&self) -> &BTreeMap<NodeKey, String> {
        &self.renames
    }

    /// Keys seen both as a file and as a directory.
    pub fn conflicts(&self) -> &BTreeSet<NodeKey> {
        &self.conflicts
    }
}

/// Split a relative path into segments. `None` if it escapes the root or is empty.
pub fn key_for(rel: &Path) -> Option<NodeKey> {
    let mut key = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(seg) => key.push(seg.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!key.is_empty()).then_some(key)
}
