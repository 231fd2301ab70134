//! Two-pass template rendering.
//!
//! ## Passes
//!
//! ```text
//! markdown template ──render──► rendered_markdown
//!        (default.mdt)                 │
//!                               re-render inline
//!                                      │
//!                              markdown → HTML ──► rendered_content
//!                                                        │
//! page template ──────────────render─────────────► rendered_html
//!   (page.html)
//! ```
//!
//! The inline re-render resolves variables that appear in the document body
//! itself, so `# {{ title }}` in a source file becomes a heading with the
//! document's title.
//!
//! ## Template lookup
//!
//! Templates come from an ordered list of [`TemplateSource`]s. All sources
//! are merged into one Tera instance; when two sources define the same name
//! the earlier one wins. Because everything lives in one instance, `extends`
//! and `include` work across locations.
//!
//! ## Context
//!
//! | Variable               | Value                                        |
//! |------------------------|----------------------------------------------|
//! | `filename`             | absolute source path                         |
//! | `rel_filename`         | path relative to the build root              |
//! | `title`                | resolved title                               |
//! | `content`              | body without the metadata header             |
//! | `meta`                 | metadata, every value a list                 |
//! | `destination_filename` | output file name                             |
//! | `destination_dirs`     | output directories                           |
//! | `destination_paths`    | every output path                            |
//! | `is_synthetic`         | injected index page                          |
//! | `sites`                | the other build units of the run             |
//! | `rendered_markdown`    | page pass only                               |
//! | `rendered_content`     | page pass only                               |

use crate::config::BuildConfig;
use crate::markdown;
use crate::naming;
use crate::store::{Document, set_if_absent};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Context, Tera, Value};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template \"{name}\" not found (searched: {searched})")]
    TemplateNotFound { name: String, searched: String },
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),
}

/// Page templates embedded in the binary.
pub static BUNDLED_PAGE_TEMPLATES: &[(&str, &str)] =
    &[("page.html", include_str!("../assets/templates/page.html"))];

/// Markdown templates embedded in the binary.
pub static BUNDLED_MARKDOWN_TEMPLATES: &[(&str, &str)] =
    &[("default.mdt", include_str!("../assets/markdown/default.mdt"))];

/// One place templates are looked up in.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    Bundled(&'static [(&'static str, &'static str)]),
    /// A directory; template names are paths relative to it. Missing directories are empty.
    Directory(PathBuf),
}

impl TemplateSource {
    pub fn describe(&self) -> String {
        match self {
            TemplateSource::Bundled(_) => "<bundled>".to_string(),
            TemplateSource::Directory(dir) => dir.display().to_string(),
        }
    }

    fn templates(&self) -> Result<Vec<(String, String)>, RenderError> {
        match self {
            TemplateSource::Bundled(items) => Ok(items
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_string()))
                .collect()),
            TemplateSource::Directory(dir) => read_template_dir(dir),
        }
    }
}

fn read_template_dir(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        match fs::read_to_string(entry.path()) {
            Ok(body) => found.push((name, body)),
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "skipping unreadable template")
            }
        }
    }
    Ok(found)
}

/// Templates merged from several sources into one Tera instance.
pub struct TemplateSet {
    tera: Tera,
    /// Template name → source it was taken from.
    origins: BTreeMap<String, String>,
    searched: Vec<String>,
}

impl TemplateSet {
    /// Load every template from `sources`; earlier sources shadow later ones.
    pub fn load(sources: &[TemplateSource], autoescape: bool) -> Result<Self, RenderError> {
        let mut merged: BTreeMap<String, String> = BTreeMap::new();
        let mut origins = BTreeMap::new();
        for source in sources {
            for (name, body) in source.templates()? {
                if !merged.contains_key(&name) {
                    origins.insert(name.clone(), source.describe());
                    merged.insert(name, body);
                }
            }
        }

        let mut tera = Tera::default();
        if autoescape {
            tera.autoescape_on(vec![".html", ".htm", ".xml"]);
        } else {
            tera.autoescape_on(vec![]);
        }
        tera.register_filter("slugify", slugify_filter);
        tera.add_raw_templates(merged.iter().map(|(n, b)| (n.as_str(), b.as_str())))?;

        Ok(Self {
            tera,
            origins,
            searched: sources.iter().map(TemplateSource::describe).collect(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.origins.contains_key(name)
    }

    /// Where a template was found.
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.origins.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.origins.keys().map(String::as_str)
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String, RenderError> {
        if !self.contains(name) {
            return Err(RenderError::TemplateNotFound {
                name: name.to_string(),
                searched: self.searched.join(", "),
            });
        }
        Ok(self.tera.render(name, context)?)
    }
}

fn slugify_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value.as_str().unwrap_or("");
    Ok(Value::String(naming::slugify(s)))
}

/// A sibling build unit as seen from templates.
#[derive(Debug, Clone, Serialize)]
pub struct SiteRef {
    pub name: String,
    pub root: PathBuf,
    pub output_dir: PathBuf,
}

impl SiteRef {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            name: config.name(),
            root: config.root_path(),
            output_dir: config.output_dir(),
        }
    }
}

/// Output of one render.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub markdown_template: String,
    pub page_template: String,
    pub rendered_markdown: String,
    pub rendered_content: String,
    pub rendered_html: String,
}

impl Rendered {
    /// Store the result on the document. Template names are set if absent; outputs are replaced.
    pub fn apply_to(self, doc: &mut Document) {
        set_if_absent(&mut doc.markdown_template, self.markdown_template);
        set_if_absent(&mut doc.page_template, self.page_template);
        doc.rendered_markdown = Some(self.rendered_markdown);
        doc.rendered_content = Some(self.rendered_content);
        doc.rendered_html = Some(self.rendered_html);
    }
}

/// A document that could not be rendered.
#[derive(Debug, Clone, Serialize)]
pub struct RenderFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Renders documents for one build unit.
pub struct Renderer {
    pages: TemplateSet,
    markdown: TemplateSet,
    extensions: Vec<String>,
    default_page: String,
    default_markdown: String,
    sites: Vec<SiteRef>,
}

impl Renderer {
    pub fn new(
        pages: TemplateSet,
        markdown: TemplateSet,
        extensions: Vec<String>,
        default_page: impl Into<String>,
        default_markdown: impl Into<String>,
    ) -> Self {
        Self {
            pages,
            markdown,
            extensions,
            default_page: default_page.into(),
            default_markdown: default_markdown.into(),
            sites: Vec::new(),
        }
    }

    /// Renderer configured from a unit's settings and template locations.
    pub fn for_config(
        config: &BuildConfig,
        others: &[Arc<BuildConfig>],
    ) -> Result<Self, RenderError> {
        let pages = TemplateSet::load(&config.template_locations(), config.autoescape())?;
        let markdown = TemplateSet::load(&config.markdown_template_locations(), false)?;
        let renderer = Self::new(
            pages,
            markdown,
            config.markdown_extensions(),
            config.page_template(),
            config.markdown_template(),
        )
        .with_sites(others.iter().map(|o| SiteRef::from_config(o)).collect());
        Ok(renderer)
    }

    pub fn with_sites(mut self, sites: Vec<SiteRef>) -> Self {
        self.sites = sites;
        self
    }

    pub fn page_templates(&self) -> &TemplateSet {
        &self.pages
    }

    pub fn markdown_templates(&self) -> &TemplateSet {
        &self.markdown
    }

    fn markdown_template_for(&self, doc: &Document) -> String {
        doc.markdown_template
            .clone()
            .or_else(|| doc.meta_str("markdown_template"))
            .unwrap_or_else(|| self.default_markdown.clone())
    }

    fn page_template_for(&self, doc: &Document) -> String {
        doc.page_template
            .clone()
            .or_else(|| doc.meta_str("template"))
            .unwrap_or_else(|| self.default_page.clone())
    }

    fn context(&self, doc: &Document) -> Context {
        let mut ctx = Context::new();
        ctx.insert("filename", &doc.source_path.to_string_lossy());
        ctx.insert(
            "rel_filename",
            &doc.rel_path
                .as_deref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        ctx.insert("title", doc.title.as_deref().unwrap_or_default());
        ctx.insert("content", doc.content.as_deref().unwrap_or_default());
        ctx.insert("meta", &doc.meta.clone().unwrap_or_default());
        ctx.insert(
            "destination_filename",
            &doc.destination_filename
                .as_deref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        ctx.insert(
            "destination_dirs",
            &paths_to_strings(doc.destination_dirs.as_deref().unwrap_or_default()),
        );
        ctx.insert("destination_paths", &paths_to_strings(&doc.destination_paths));
        ctx.insert("is_synthetic", &doc.is_synthetic());
        ctx.insert("sites", &self.sites);
        ctx
    }

    /// Run both passes for one document.
    pub fn render(&self, doc: &Document) -> Result<Rendered, RenderError> {
        let markdown_template = self.markdown_template_for(doc);
        let page_template = self.page_template_for(doc);
        let mut ctx = self.context(doc);

        let rendered_markdown = self.markdown.render(&markdown_template, &ctx)?;
        ctx.insert("rendered_markdown", &rendered_markdown);

        let resolved = Tera::one_off(&rendered_markdown, &ctx, false)?;
        let rendered_content = markdown::to_html(&resolved, &self.extensions);
        ctx.insert("rendered_content", &rendered_content);

        let rendered_html = self.pages.render(&page_template, &ctx)?;
        Ok(Rendered {
            markdown_template,
            page_template,
            rendered_markdown,
            rendered_content,
            rendered_html,
        })
    }
}

fn paths_to_strings(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}
