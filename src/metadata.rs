//! Metadata header parsing and field resolution.
//!
//! A source document may open with a block of `key: value` lines:
//!
//! ```text
//! title: Another Page
//! tags: guide
//! destination_dirs: other/foo/
//!                   egg/butter
//! ---
//! # Hello
//! ```
//!
//! ## Header rules
//!
//! - An optional leading `---` line opens the block.
//! - `key: value` lines may be indented by up to three spaces. Keys are
//!   lower-cased; repeated keys append to the same list.
//! - A line indented by four or more spaces continues the previous key.
//! - A blank line, `---` or `...` closes the block.
//! - The first line that is none of the above ends the block and is kept as
//!   part of the body.
//!
//! Every value is a list of strings, so single- and multi-line values share
//! one representation.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Extracted metadata: lower-cased key → values in order of appearance.
pub type Metadata = BTreeMap<String, Vec<String>>;

static BEGIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-{3}(\s.*)?$").unwrap());
static END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(-{3}|\.{3})(\s.*)?$").unwrap());
static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{0,3}(?P<key>[A-Za-z0-9_-]+):\s*(?P<value>.*)$").unwrap());
static CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{4,}(?P<value>.*)$").unwrap());

/// Split a document into its metadata header and body.
///
/// Documents without a header come back with empty metadata and the full
/// text as body.
pub fn parse_header(content: &str) -> (Metadata, String) {
    let text = content.trim_start_matches('\u{feff}');
    let mut lines: Vec<&str> = text.lines().collect();
    let mut meta = Metadata::new();
    let mut cursor = 0;

    if lines.first().is_some_and(|l| BEGIN.is_match(l)) {
        cursor = 1;
    }

    let mut key: Option<String> = None;
    while cursor < lines.len() {
        let line = lines[cursor];
        if line.trim().is_empty() || END.is_match(line) {
            cursor += 1;
            break;
        }
        if let Some(caps) = ENTRY.captures(line) {
            let k = caps["key"].to_lowercase();
            meta.entry(k.clone())
                .or_default()
                .push(caps["value"].trim().to_string());
            key = Some(k);
        } else if let (Some(k), Some(caps)) = (&key, CONTINUATION.captures(line)) {
            if let Some(values) = meta.get_mut(k) {
                values.push(caps["value"].trim().to_string());
            }
        } else {
            break;
        }
        cursor += 1;
    }

    if meta.is_empty() && cursor <= 1 && !lines.first().is_some_and(|l| BEGIN.is_match(l)) {
        return (meta, text.to_string());
    }

    let body = lines.split_off(cursor.min(lines.len())).join("\n");
    (meta, body)
}

/// Expand a raw value list into individual items.
///
/// Continuation lines already arrive as separate values. A single inline
/// list such as `[a/, b/]` is split on commas. Empty items are dropped.
pub fn expand_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| {
            let trimmed = value.trim();
            match trimmed.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
                Some(inner) => inner.split(',').map(|s| s.trim().to_string()).collect(),
                None => vec![trimmed.to_string()],
            }
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Join a multi-line value into one string (e.g. a wrapped title).
pub fn joined(values: &[String]) -> String {
    values.join(" ").trim().to_string()
}

/// Resolve a field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value.
///
/// ```text
/// title: resolve(&[meta_title, filename_stem])
/// ```
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_then_blank_line_then_body() {
        let (meta, body) = parse_header("title: Hello\ntags: a\n\n# Heading\ntext");
        assert_eq!(meta["title"], vec!["Hello"]);
        assert_eq!(meta["tags"], vec!["a"]);
        assert_eq!(body, "# Heading\ntext");
    }

    #[test]
    fn header_closed_by_rule() {
        let (meta, body) = parse_header("title: another\n---\n# Hello");
        assert_eq!(meta["title"], vec!["another"]);
        assert_eq!(body, "# Hello");
    }

    #[test]
    fn header_with_opening_rule() {
        let (meta, body) = parse_header("---\ntitle: Fenced\n---\nBody");
        assert_eq!(meta["title"], vec!["Fenced"]);
        assert_eq!(body, "Body");
    }

    #[test]
    fn continuation_lines_extend_previous_key() {
        let input = "title: another\ndestination_dirs: other/foo/\n                  egg/butter\n---\n# Hello";
        let (meta, body) = parse_header(input);
        assert_eq!(meta["destination_dirs"], vec!["other/foo/", "egg/butter"]);
        assert_eq!(body, "# Hello");
    }

    #[test]
    fn keys_are_lowercased_and_repeats_append() {
        let (meta, _) = parse_header("Tag: one\nTAG: two\n\nbody");
        assert_eq!(meta["tag"], vec!["one", "two"]);
    }

    #[test]
    fn no_header_keeps_full_body() {
        let (meta, body) = parse_header("# Title\n\nSome text: with a colon later");
        assert!(meta.is_empty());
        assert_eq!(body, "# Title\n\nSome text: with a colon later");
    }

    #[test]
    fn first_non_matching_line_belongs_to_body() {
        let (meta, body) = parse_header("title: T\n# Heading right away");
        assert_eq!(meta["title"], vec!["T"]);
        assert_eq!(body, "# Heading right away");
    }

    #[test]
    fn bom_is_ignored() {
        let (meta, _) = parse_header("\u{feff}title: Bom\n\nx");
        assert_eq!(meta["title"], vec!["Bom"]);
    }

    #[test]
    fn expand_inline_list() {
        let values = vec!["[a/, b/]".to_string()];
        assert_eq!(expand_list(&values), vec!["a/", "b/"]);
    }

    #[test]
    fn expand_keeps_separate_lines() {
        let values = vec!["a/".to_string(), "".to_string(), "b/".to_string()];
        assert_eq!(expand_list(&values), vec!["a/", "b/"]);
    }

    #[test]
    fn joined_wraps_multiline_titles() {
        let values = vec!["A long".to_string(), "title".to_string()];
        assert_eq!(joined(&values), "A long title");
    }

    #[test]
    fn resolve_first_non_empty() {
        assert_eq!(resolve(&[None, Some("  "), Some("stem")]), Some("stem".into()));
        assert_eq!(resolve(&[Some("Meta"), Some("stem")]), Some("Meta".into()));
        assert_eq!(resolve(&[None, None]), None);
    }
}
