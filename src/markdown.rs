//! Markdown to HTML conversion.
//!
//! Extension names from the `markdown_extensions` setting are mapped onto
//! pulldown-cmark options:
//!
//! | Name            | Effect                                                   |
//! |-----------------|----------------------------------------------------------|
//! | `extra`         | tables, footnotes, heading attributes, definition lists  |
//! | `tables`        | tables                                                   |
//! | `footnotes`     | footnotes                                                |
//! | `attr_list`     | `{#id .class}` heading attributes                        |
//! | `def_list`      | definition lists                                         |
//! | `smarty`        | smart quotes and dashes                                  |
//! | `strikethrough` | `~~struck~~`                                             |
//! | `tasklists`     | `- [x] done`                                             |
//! | `toc`           | slug ids on every heading                                |
//! | `meta`          | strips a leading `key: value` header into [`Converted::meta`] |
//! | `sane_lists`    | accepted; the parser already keeps list types apart      |
//!
//! Extension names may carry a dotted prefix (`markdown.extensions.toc`).

use crate::metadata::{self, Metadata};
use crate::naming;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html as md_html};
use std::collections::HashMap;

/// Extensions used when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["extra", "smarty", "toc", "sane_lists"];

/// HTML plus metadata extracted by the `meta` extension.
#[derive(Debug, Clone, Default)]
pub struct Converted {
    pub html: String,
    pub meta: Metadata,
}

#[derive(Debug, Clone, Copy)]
struct Features {
    options: Options,
    heading_ids: bool,
    meta: bool,
}

fn features(extensions: &[String]) -> Features {
    let mut features = Features {
        options: Options::empty(),
        heading_ids: false,
        meta: false,
    };
    for ext in extensions {
        let name = ext.rsplit('.').next().unwrap_or(ext).to_lowercase();
        match name.as_str() {
            "extra" => {
                features.options |= Options::ENABLE_TABLES
                    | Options::ENABLE_FOOTNOTES
                    | Options::ENABLE_HEADING_ATTRIBUTES
                    | Options::ENABLE_DEFINITION_LIST;
            }
            "tables" => features.options |= Options::ENABLE_TABLES,
            "footnotes" => features.options |= Options::ENABLE_FOOTNOTES,
            "attr_list" => features.options |= Options::ENABLE_HEADING_ATTRIBUTES,
            "def_list" => features.options |= Options::ENABLE_DEFINITION_LIST,
            "smarty" => features.options |= Options::ENABLE_SMART_PUNCTUATION,
            "strikethrough" => features.options |= Options::ENABLE_STRIKETHROUGH,
            "tasklists" => features.options |= Options::ENABLE_TASKLISTS,
            "toc" => features.heading_ids = true,
            "meta" => features.meta = true,
            "sane_lists" => {}
            _ => tracing::warn!(extension = %ext, "unknown markdown extension ignored"),
        }
    }
    features
}

/// Parser options for an extension list.
pub fn options_for(extensions: &[String]) -> Options {
    features(extensions).options
}

/// Convert markdown to HTML, extracting a metadata header when `meta` is enabled.
pub fn convert(text: &str, extensions: &[String]) -> Converted {
    let features = features(extensions);
    let (meta, body) = if features.meta {
        metadata::parse_header(text)
    } else {
        (Metadata::new(), text.to_string())
    };

    let mut events: Vec<Event<'_>> = Parser::new_ext(&body, features.options).collect();
    if features.heading_ids {
        assign_heading_ids(&mut events);
    }

    let mut html = String::with_capacity(body.len() * 3 / 2);
    md_html::push_html(&mut html, events.into_iter());
    Converted { html, meta }
}

/// Convert markdown to HTML.
pub fn to_html(text: &str, extensions: &[String]) -> String {
    convert(text, extensions).html
}

/// Give every heading without an explicit id a unique slug id.
fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    for i in 0..events.len() {
        let id = match &events[i] {
            Event::Start(Tag::Heading { id: Some(id), .. }) => {
                seen.entry(id.to_string()).or_insert(1);
                continue;
            }
            Event::Start(Tag::Heading { id: None, .. }) => {
                unique_id(&heading_text(&events[i + 1..]), &mut seen)
            }
            _ => continue,
        };
        if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[i] {
            *slot = Some(id.into());
        }
    }
}

fn heading_text(events: &[Event<'_>]) -> String {
    events
        .iter()
        .take_while(|e| !matches!(e, Event::End(TagEnd::Heading(_))))
        .filter_map(|e| match e {
            Event::Text(t) | Event::Code(t) => Some(t.as_ref()),
            _ => None,
        })
        .collect()
}

fn unique_id(text: &str, seen: &mut HashMap<String, usize>) -> String {
    let mut base = naming::slugify(text);
    if base.is_empty() {
        base = "section".to_string();
    }
    let count = seen.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}-{}", *count - 1)
    }
}
