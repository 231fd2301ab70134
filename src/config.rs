//! Build configuration resolution.
//!
//! Each target given on the command line becomes one [`BuildConfig`]. Its
//! settings come from several layers, looked up highest priority first:
//!
//! ```text
//! 1. explicit overrides     --set output_dir=public
//! 2. discovered config      <target>/**/pyproject.toml or <target>/**/docs.yaml
//! 3. master config          --config shared.yaml
//! 4. defaults               built into the resolver
//! ```
//!
//! ## Config File Discovery
//!
//! For each candidate name (`pyproject.toml`, then `docs.yaml`) the target
//! itself is checked first: a target that *is* a config file is used
//! directly. Otherwise the target directory is searched recursively and the
//! shallowest match wins. In a `pyproject.toml` the `[tool.doctool]` table
//! is used when present.
//!
//! A config may hand off to another file with `config_path = "other.yaml"`
//! (relative to the file that says so). Hand-offs are followed until a file
//! without `config_path` is reached.
//!
//! ## Recognised Keys
//!
//! ```yaml
//! docs_dir: docs             # where sources live (default: the target)
//! output_root_dir: build     # where the site folder goes (default: the target)
//! output_dir: public         # explicit output folder (default: <output_root_dir>/<site_dir_name>)
//! output_dirs: [a, b]        # several output roots, each written in full
//! site_dir_name: site
//! suffixes: [md]
//! markdown_extensions: [extra, smarty, toc, sane_lists]
//! page_template: page.html
//! markdown_template: default.mdt
//! autoescape: false
//! title: Index               # title of the injected root index
//! base_utils: [printer, general, indexer, writer]
//! ```
//!
//! Lookups never chain implicitly: [`Settings::get`] walks an explicit key
//! path and returns `None` as soon as a segment is missing.

use crate::render::{BUNDLED_MARKDOWN_TEMPLATES, BUNDLED_PAGE_TEMPLATES, TemplateSource};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No reader for config file: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Config hand-off loops back to {0}")]
    RepointCycle(PathBuf),
    #[error("Target path does not exist: {0}")]
    MissingTarget(PathBuf),
    #[error("Utility was not located: \"{0}\"")]
    UnknownUtility(String),
    #[error("Invalid override \"{0}\": expected KEY=VALUE")]
    InvalidOverride(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Config file names searched for, in priority order.
pub const CONFIG_FILE_NAMES: &[&str] = &["pyproject.toml", "docs.yaml"];
/// Token in a utility list that expands to the previous unit's utilities.
pub const EXISTING_UTILITIES: &str = "__existing__";

const REPOINT_KEY: &str = "config_path";
const DEFAULT_SITE_DIR_NAME: &str = "site";
const DEFAULT_SUFFIXES: &[&str] = &["md"];
const DEFAULT_MARKDOWN_EXTENSIONS: &[&str] = &["extra", "smarty", "toc", "sane_lists"];
const DEFAULT_PAGE_TEMPLATE: &str = "page.html";
const DEFAULT_MARKDOWN_TEMPLATE: &str = "default.mdt";
const DEFAULT_ROOT_TITLE: &str = "Index";

// =============================================================================
// Layered settings
// =============================================================================

/// Layered key-value settings, highest priority layer first.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    layers: Vec<Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer below every existing one.
    pub fn with_layer(mut self, layer: Value) -> Self {
        if !layer.is_null() {
            self.layers.push(layer);
        }
        self
    }

    /// Look up a key path in each layer; the first layer holding a non-null value wins.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        self.layers.iter().find_map(|layer| lookup(layer, path))
    }

    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_bool(&self, path: &[&str]) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// A list of strings; a bare string counts as a one-item list.
    pub fn get_str_list(&self, path: &[&str]) -> Option<Vec<String>> {
        match self.get(path)? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// All layers flattened into one value (lower layers first, higher layers on top).
    pub fn merged(&self) -> Value {
        self.layers
            .iter()
            .rev()
            .cloned()
            .fold(Value::Object(Map::new()), merge_values)
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |v, key| v.as_object()?.get(*key))
        .filter(|v| !v.is_null())
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Objects are merged key-by-key (overlay keys override base keys).
/// - Non-object values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Build the explicit-override layer from `KEY=VALUE` strings.
///
/// Dotted keys nest (`docs.printer.relative=false`). Values are parsed as
/// JSON when they are valid JSON and kept as plain strings otherwise.
pub fn overrides_layer(overrides: &[String]) -> Result<Value, ConfigError> {
    overrides
        .iter()
        .try_fold(Value::Object(Map::new()), |layer, raw| {
            let (key, value) = raw
                .split_once('=')
                .filter(|(k, _)| !k.trim().is_empty())
                .ok_or_else(|| ConfigError::InvalidOverride(raw.clone()))?;
            let value = serde_json::from_str(value.trim())
                .unwrap_or_else(|_| Value::String(value.trim().to_string()));
            let nested = key
                .trim()
                .rsplit('.')
                .fold(value, |inner, segment| {
                    let mut map = Map::new();
                    map.insert(segment.to_string(), inner);
                    Value::Object(map)
                });
            Ok(merge_values(layer, nested))
        })
}

// =============================================================================
// Config files
// =============================================================================

/// Find the config file for a target, if any.
pub fn discover_config_file(target: &Path) -> Option<PathBuf> {
    for name in CONFIG_FILE_NAMES {
        if target.file_name().is_some_and(|n| n == *name) && target.is_file() {
            return Some(target.to_path_buf());
        }
        if target.is_dir() {
            let found = WalkDir::new(target)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && e.file_name() == *name)
                .min_by_key(|e| e.depth());
            if let Some(entry) = found {
                return Some(entry.into_path());
            }
        }
    }
    None
}

/// Read one config file into a settings value, choosing the reader by suffix.
pub fn read_config_file(path: &Path) -> Result<Value, ConfigError> {
    let suffix = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let content = fs::read_to_string(path)?;
    let value: Value = match suffix.as_str() {
        "toml" => toml::from_str(&content)?,
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        "json" => serde_json::from_str(&content)?,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    let is_pyproject = path.file_name().is_some_and(|n| n == "pyproject.toml");
    let value = match value.pointer("/tool/doctool") {
        Some(table) if is_pyproject => table.clone(),
        _ => value,
    };

    Ok(match value {
        Value::Null => Value::Object(Map::new()),
        other => other,
    })
}

/// Load a config file, following `config_path` hand-offs.
///
/// Returns the path of the file that finally supplied the settings.
pub fn load_and_repoint(path: &Path) -> Result<(PathBuf, Value), ConfigError> {
    let mut current = path.to_path_buf();
    let mut visited: Vec<PathBuf> = Vec::new();
    loop {
        if visited.contains(&current) {
            return Err(ConfigError::RepointCycle(current));
        }
        tracing::debug!(path = %current.display(), "loading config");
        let data = read_config_file(&current)?;
        let next = data.get(REPOINT_KEY).and_then(Value::as_str).map(PathBuf::from);
        visited.push(current.clone());
        match next {
            Some(next) => {
                let base = current.parent().unwrap_or(Path::new("."));
                current = if next.is_absolute() { next } else { base.join(next) };
                tracing::debug!(to = %current.display(), "config hands off");
            }
            None => return Ok((current, data)),
        }
    }
}

// =============================================================================
// Build configuration
// =============================================================================

/// Resolved configuration of one build unit.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// The target exactly as given.
    pub given_path: PathBuf,
    /// The target as an absolute path.
    pub original_path: PathBuf,
    /// Directory relative targets were resolved against.
    pub run_cwd: PathBuf,
    /// Config file that supplied the file layer, after hand-offs.
    pub config_path: Option<PathBuf>,
    pub settings: Settings,
}

impl BuildConfig {
    /// Resolve a target into a build configuration.
    ///
    /// `explicit` and `master` are the override and master-config layers
    /// shared by every target of the run.
    pub fn resolve(
        given: &Path,
        cwd: &Path,
        explicit: &Value,
        master: Option<&Value>,
    ) -> Result<Self, ConfigError> {
        let original_path = if given.is_absolute() {
            given.to_path_buf()
        } else {
            cwd.join(given)
        };
        if !original_path.exists() {
            return Err(ConfigError::MissingTarget(original_path));
        }

        let (config_path, file_layer) = match discover_config_file(&original_path) {
            Some(found) => {
                let (path, data) = load_and_repoint(&found)?;
                (Some(path), data)
            }
            None => (None, Value::Null),
        };

        let settings = Settings::new()
            .with_layer(explicit.clone())
            .with_layer(file_layer)
            .with_layer(master.cloned().unwrap_or(Value::Null));

        let config = Self {
            given_path: given.to_path_buf(),
            original_path,
            run_cwd: cwd.to_path_buf(),
            config_path,
            settings,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate settings that would otherwise fail late or write outside the output root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let site = self.site_dir_name();
        if site.trim().is_empty() || Path::new(&site).is_absolute() {
            return Err(ConfigError::Validation(
                "site_dir_name must be a non-empty relative path".into(),
            ));
        }
        if self.suffixes().is_empty() {
            return Err(ConfigError::Validation("suffixes must not be empty".into()));
        }
        Ok(())
    }

    /// Short display name for narration.
    pub fn name(&self) -> String {
        self.given_path.display().to_string()
    }

    /// The target directory (the parent when the target is a config file).
    pub fn base_dir(&self) -> PathBuf {
        if self.original_path.is_dir() {
            self.original_path.clone()
        } else {
            self.original_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.run_cwd.clone())
        }
    }

    /// Directory relative settings are resolved against: the config file's, else the target's.
    fn settings_dir(&self) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir())
    }

    /// Where the source files live.
    pub fn root_path(&self) -> PathBuf {
        match self.settings.get_str(&["docs_dir"]) {
            Some(dir) => self.settings_dir().join(dir),
            None => self.base_dir(),
        }
    }

    /// Folder the site directory is placed in.
    pub fn output_root_dir(&self) -> PathBuf {
        match self.settings.get_str(&["output_root_dir"]) {
            Some(dir) => self.base_dir().join(dir),
            None => self.base_dir(),
        }
    }

    /// Name of the site sub-directory under the output root.
    pub fn site_dir_name(&self) -> String {
        self.settings
            .get_str(&["site_dir_name"])
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SITE_DIR_NAME)
            .to_string()
    }

    /// The primary output directory.
    ///
    /// An explicit `output_dir` is used as is when absolute, or placed under
    /// the output root when relative. Without it the site directory name is
    /// appended to the output root.
    pub fn output_dir(&self) -> PathBuf {
        match self.settings.get_str(&["output_dir"]) {
            Some(dir) => self.output_root_dir().join(dir),
            None => self.output_root_dir().join(self.site_dir_name()),
        }
    }

    /// Every output root a document is written under.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        match self.settings.get_str_list(&["output_dirs"]) {
            Some(dirs) if !dirs.is_empty() => dirs
                .iter()
                .map(|d| self.output_root_dir().join(d))
                .collect(),
            _ => vec![self.output_dir()],
        }
    }

    /// Directory the run was started from; hosts the shared `templates/` folder.
    pub fn host_path(&self) -> PathBuf {
        self.run_cwd.clone()
    }

    /// Page template search order. The first location holding a name wins.
    pub fn template_locations(&self) -> Vec<TemplateSource> {
        self.locations(BUNDLED_PAGE_TEMPLATES, "assets/templates")
    }

    /// Markdown template search order, same cascade under `assets/markdown`.
    pub fn markdown_template_locations(&self) -> Vec<TemplateSource> {
        self.locations(BUNDLED_MARKDOWN_TEMPLATES, "assets/markdown")
    }

    fn locations(
        &self,
        bundled: &'static [(&'static str, &'static str)],
        asset_dir: &str,
    ) -> Vec<TemplateSource> {
        vec![
            TemplateSource::Bundled(bundled),
            TemplateSource::Directory(self.base_dir().join(asset_dir)),
            TemplateSource::Directory(self.root_path().join(asset_dir)),
            TemplateSource::Directory(self.host_path().join("templates")),
        ]
    }

    /// File suffixes treated as content, without the dot.
    pub fn suffixes(&self) -> Vec<String> {
        self.settings
            .get_str_list(&["suffixes"])
            .unwrap_or_else(|| owned(DEFAULT_SUFFIXES))
            .into_iter()
            .map(|s| s.trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn markdown_extensions(&self) -> Vec<String> {
        self.settings
            .get_str_list(&["markdown_extensions"])
            .unwrap_or_else(|| owned(DEFAULT_MARKDOWN_EXTENSIONS))
    }

    pub fn page_template(&self) -> String {
        self.settings
            .get_str(&["page_template"])
            .unwrap_or(DEFAULT_PAGE_TEMPLATE)
            .to_string()
    }

    pub fn markdown_template(&self) -> String {
        self.settings
            .get_str(&["markdown_template"])
            .unwrap_or(DEFAULT_MARKDOWN_TEMPLATE)
            .to_string()
    }

    pub fn autoescape(&self) -> bool {
        self.settings.get_bool(&["autoescape"]).unwrap_or(false)
    }

    /// Title given to an injected root index.
    pub fn root_title(&self) -> String {
        self.settings
            .get_str(&["title"])
            .unwrap_or(DEFAULT_ROOT_TITLE)
            .to_string()
    }

    /// Whether the printer shows paths relative to the root.
    pub fn printer_relative(&self) -> bool {
        self.settings
            .get_bool(&["docs", "printer", "relative"])
            .unwrap_or(true)
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Resolve the utility names for one unit.
///
/// Looks in `docs.base.utils`, then `base_utils`, then `utils`, falling back
/// to `defaults`. [`EXISTING_UTILITIES`] expands to `existing`, the list
/// resolved for the previous unit.
pub fn resolve_utility_names(
    settings: &Settings,
    defaults: &[String],
    existing: &[String],
) -> Vec<String> {
    let named = settings
        .get_str_list(&["docs", "base", "utils"])
        .or_else(|| settings.get_str_list(&["base_utils"]))
        .or_else(|| settings.get_str_list(&["utils"]))
        .unwrap_or_else(|| defaults.to_vec());

    named
        .into_iter()
        .flat_map(|name| {
            if name == EXISTING_UTILITIES {
                existing.to_vec()
            } else {
                vec![name]
            }
        })
        .collect()
}

/// Returns a fully-commented stock `docs.yaml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_yaml() -> &'static str {
    r##"# doctool configuration
# =====================
# All settings are optional. Values shown below are the defaults.
#
# doctool looks for pyproject.toml ([tool.doctool] table) and then
# docs.yaml inside each target. Settings given with --set override this
# file; a --config master file sits below it.

# Hand off to another config file (path relative to this file).
# config_path: ../shared/docs.yaml

# Where the markdown sources live, relative to this file.
# docs_dir: docs

# Folder the site directory is created in, relative to the target.
# output_root_dir: build

# Explicit output folder. Relative paths sit under output_root_dir;
# without it the site goes to <output_root_dir>/<site_dir_name>.
# output_dir: public

# Write the whole site under several roots at once.
# output_dirs: [public, mirror]

site_dir_name: site

# Source file suffixes treated as documents.
suffixes: [md]

# Markdown converter extensions: extra, tables, footnotes, attr_list,
# def_list, smarty, strikethrough, tasklists, toc, meta, sane_lists.
markdown_extensions: [extra, smarty, toc, sane_lists]

# Default templates. The bundled page.html and default.mdt are found first;
# put your own under assets/templates/ or assets/markdown/ with a new
# name and select it here or per document with `template:` and
# `markdown_template:` metadata.
page_template: page.html
markdown_template: default.mdt

# Escape variables inside .html page templates.
autoescape: false

# Title of the index page injected at the root when none exists.
title: Index

# Stage utilities, run in order. "__existing__" repeats the previous
# target's list.
base_utils: [printer, general, indexer, writer]

docs:
  printer:
    # Show discovered paths relative to the docs root.
    relative: true
"##
}
