//! # doctool
//!
//! A staged documentation generator. A directory of markdown files goes in;
//! a static HTML site comes out, with an index page in every directory.
//!
//! # Architecture: Staged Pipeline
//!
//! Every target (a directory or a config file) becomes a build unit. Units
//! move through the same stages together; no unit starts a stage until every
//! unit has finished the previous one.
//!
//! ```text
//! prepare
//! preprocess        docs/**/*.md  →  DocumentStore   (content + metadata header)
//! postprocess       titles, destination names and directories
//! finalize_content  destination paths under every output root
//! plug_holes        Tree built from the store; readmes promoted, indexes injected
//! build_indexes     listings for injected indexes
//! render_out        markdown template → HTML → page template
//! write_all         one file per destination path
//! ```
//!
//! The work of each stage is done by [`utility`] implementations named in
//! the unit's config, so a config can drop narration or index injection by
//! leaving the utility out.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Config discovery (`pyproject.toml`, `docs.yaml`), layered settings, path resolution |
//! | [`store`] | Per-unit document records keyed by source path |
//! | [`metadata`] | `key: value` header parsing |
//! | [`naming`] | Slugs, stems and destination filenames |
//! | [`scan`] | Discovery walk and extraction into the store |
//! | [`tree`] | Prefix tree of the documents, directories and files |
//! | [`plug`] | Index planning: readme promotion and synthetic indexes |
//! | [`markdown`] | Markdown to HTML with named extensions |
//! | [`render`] | Cascading Tera template sets and the two-pass render |
//! | [`write`] | Destination computation, fan-out, write report |
//! | [`utility`] | The stage hooks and the built-in utilities |
//! | [`pipeline`] | [`pipeline::Generator`]: units, stages, summaries |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Set-If-Absent Records
//!
//! Every stage before rendering only fills fields that are still empty. A
//! utility that runs early, or a caller seeding the store between stages,
//! wins over the defaults computed later. Renaming a promoted readme to
//! `index.html` is the one explicit overwrite.
//!
//! ## Two-Pass Rendering
//!
//! The markdown template wraps the document body, and its output is rendered
//! once more as an inline template, so `{{ title }}` written in a document
//! body works. Only then is the markdown converted and placed into the page
//! template. Templates cascade: the bundled set first, then the configured
//! directories.
//!
//! ## Failures Are Reported, Not Fatal
//!
//! A bad config stops everything before a file is read. After that, an
//! unreadable source, a missing template or a failed write only costs the
//! affected document; the rest of the site is still written and the final
//! summary lists what went wrong.

pub mod config;
pub mod markdown;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod plug;
pub mod render;
pub mod scan;
pub mod store;
pub mod tree;
pub mod utility;
pub mod write;

#[cfg(test)]
pub(crate) mod test_helpers;
