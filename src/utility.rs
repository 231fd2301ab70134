//! Pluggable stage utilities.
//!
//! A utility hooks into any of the pipeline stages; every hook defaults to
//! doing nothing. Configs name the utilities to run (`base_utils`), and
//! names are resolved against the built-ins:
//!
//! | Name      | Stages                                                        |
//! |-----------|---------------------------------------------------------------|
//! | `printer` | postprocess: discovered documents; build_indexes: plugged tree |
//! | `general` | preprocess: extraction; postprocess: titles; render_out       |
//! | `indexer` | plug_holes: readme promotion and index injection; build_indexes: listings |
//! | `writer`  | postprocess: destination names; finalize_content and build_indexes: destination paths; write_all |
//!
//! A name matches exactly, or by its last dotted segment ignoring case, so
//! `docs.utils.Writer` resolves to `writer`.

use crate::config::{BuildConfig, ConfigError};
use crate::output;
use crate::pipeline::{BuildError, UnitState};
use crate::plug;
use crate::render::{RenderFailure, Renderer};
use crate::scan;
use crate::store::set_if_absent;
use crate::write::{self, SiteWriter};
use rayon::prelude::*;
use std::path::PathBuf;

/// Utilities run when a config names none.
pub const DEFAULT_UTILITIES: &[&str] = &["printer", "general", "indexer", "writer"];

/// Names of every built-in utility.
pub const BUILTIN_UTILITIES: &[&str] = &["printer", "general", "indexer", "writer"];

pub trait Utility: Send {
    fn name(&self) -> &'static str;

    fn prepare(&mut self, _unit: &mut UnitState) -> Result<(), BuildError> {
        Ok(())
    }

    fn preprocess(&mut self, _unit: &mut UnitState) -> Result<(), BuildError> {
        Ok(())
    }

    fn postprocess(&mut self, _unit: &mut UnitState) -> Result<(), BuildError> {
        Ok(())
    }

    fn finalize_content(&mut self, _unit: &mut UnitState) -> Result<(), BuildError> {
        Ok(())
    }

    fn plug_holes(&mut self, _unit: &mut UnitState) -> Result<(), BuildError> {
        Ok(())
    }

    fn build_indexes(&mut self, _unit: &mut UnitState) -> Result<(), BuildError> {
        Ok(())
    }

    fn render_out(&mut self, _unit: &mut UnitState, _renderer: &Renderer) -> Result<(), BuildError> {
        Ok(())
    }

    fn write_all(&mut self, _unit: &mut UnitState, _writer: &SiteWriter) -> Result<(), BuildError> {
        Ok(())
    }
}

/// Canonical built-in name for a configured name.
pub fn resolve(name: &str) -> Option<&'static str> {
    if let Some(exact) = BUILTIN_UTILITIES.iter().copied().find(|b| *b == name) {
        return Some(exact);
    }
    let last = name.rsplit('.').next().unwrap_or(name);
    BUILTIN_UTILITIES
        .iter()
        .find(|b| b.eq_ignore_ascii_case(last))
        .copied()
}

/// Instantiate the named utilities for one unit, in order.
pub fn build_utilities(
    names: &[String],
    config: &BuildConfig,
) -> Result<Vec<Box<dyn Utility>>, ConfigError> {
    names
        .iter()
        .map(|name| {
            let canonical = resolve(name).ok_or_else(|| ConfigError::UnknownUtility(name.clone()))?;
            let utility: Box<dyn Utility> = match canonical {
                "printer" => Box::new(Printer {
                    relative: config.printer_relative(),
                }),
                "general" => Box::new(General),
                "indexer" => Box::new(Indexer),
                "writer" => Box::new(Writer),
                other => return Err(ConfigError::UnknownUtility(other.to_string())),
            };
            Ok(utility)
        })
        .collect()
}

// ============================================================================
// Printer
// ============================================================================

/// Narrates what each stage found.
pub struct Printer {
    relative: bool,
}

impl Utility for Printer {
    fn name(&self) -> &'static str {
        "printer"
    }

    fn postprocess(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        let root = unit.config.root_path();
        let relative_to = self.relative.then_some(root.as_path());
        output::print_discovery(&unit.config.name(), &unit.store, &unit.skipped, relative_to);
        Ok(())
    }

    fn build_indexes(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        output::print_plug_actions(&unit.plug_actions);
        output::print_tree(&unit.tree);
        Ok(())
    }
}

// ============================================================================
// General
// ============================================================================

/// Extraction, titles and rendering.
pub struct General;

impl Utility for General {
    fn name(&self) -> &'static str {
        "general"
    }

    fn preprocess(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        let root = unit.config.root_path();
        let discovered = scan::discover(&root, &unit.config.output_dirs());
        let suffixes = unit.config.suffixes();
        let skipped = scan::extract_all(&root, &suffixes, &discovered, &mut unit.store);
        tracing::info!(
            unit = %unit.config.name(),
            files = discovered.len(),
            documents = unit.store.files().count(),
            skipped = skipped.len(),
            "extracted"
        );
        unit.discovered = discovered;
        unit.skipped.extend(skipped);
        Ok(())
    }

    fn postprocess(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        scan::resolve_titles(&mut unit.store);
        Ok(())
    }

    fn render_out(&mut self, unit: &mut UnitState, renderer: &Renderer) -> Result<(), BuildError> {
        let results: Vec<(PathBuf, Result<_, _>)> = unit
            .store
            .files()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|doc| (doc.source_path.clone(), renderer.render(doc)))
            .collect();

        for (source, result) in results {
            match result {
                Ok(rendered) => {
                    if let Some(doc) = unit.store.get_mut(&source) {
                        rendered.apply_to(doc);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %source.display(), error = %e, "render failed");
                    unit.render_failures.push(RenderFailure {
                        source,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Indexer
// ============================================================================

/// Gives every directory an index page.
pub struct Indexer;

impl Utility for Indexer {
    fn name(&self) -> &'static str {
        "indexer"
    }

    fn plug_holes(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        let actions = plug::plan(&unit.tree);
        let title = unit.config.root_title();
        let outcome = plug::apply(&actions, &mut unit.tree, &mut unit.store, &title);
        tracing::info!(
            unit = %unit.config.name(),
            promoted = outcome.promoted.len(),
            injected = outcome.injected.len(),
            "holes plugged"
        );
        unit.plug_actions.extend(actions);
        Ok(())
    }

    fn build_indexes(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        let filled = plug::build_index_listing(&unit.tree, &mut unit.store);
        tracing::debug!(unit = %unit.config.name(), filled, "index listings built");
        Ok(())
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Destinations and output.
pub struct Writer;

impl Writer {
    fn refresh_destination_paths(unit: &mut UnitState) {
        let roots = unit.config.output_dirs();
        for doc in unit.store.iter_mut().filter(|d| d.is_file) {
            let filename = doc
                .destination_filename
                .clone()
                .unwrap_or_else(|| write::destination_filename(doc));
            let dirs = doc
                .destination_dirs
                .clone()
                .unwrap_or_else(|| write::destination_dirs(doc));
            doc.destination_paths = write::destination_targets(&roots, &dirs, &filename);
        }
    }
}

impl Utility for Writer {
    fn name(&self) -> &'static str {
        "writer"
    }

    fn postprocess(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        for doc in unit.store.iter_mut().filter(|d| d.is_file) {
            let filename = write::destination_filename(doc);
            let dirs = write::destination_dirs(doc);
            set_if_absent(&mut doc.destination_filename, filename);
            set_if_absent(&mut doc.destination_dirs, dirs);
        }
        Ok(())
    }

    fn finalize_content(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        Self::refresh_destination_paths(unit);
        Ok(())
    }

    fn build_indexes(&mut self, unit: &mut UnitState) -> Result<(), BuildError> {
        Self::refresh_destination_paths(unit);
        Ok(())
    }

    fn write_all(&mut self, unit: &mut UnitState, writer: &SiteWriter) -> Result<(), BuildError> {
        let sources: Vec<PathBuf> = unit
            .tree
            .files()
            .map(|(key, _)| unit.tree.source_path(key))
            .collect();

        for source in sources {
            let Some(doc) = unit.store.get(&source) else {
                continue;
            };
            match &doc.rendered_html {
                Some(html) => {
                    unit.write_report
                        .write_document(writer, &source, &doc.destination_paths, html);
                }
                None => {
                    let target = doc.destination_paths.first().cloned().unwrap_or_default();
                    unit.write_report
                        .record_failure(&source, target, "no rendered output");
                }
            }
        }
        tracing::info!(
            unit = %unit.config.name(),
            written = unit.write_report.written.len(),
            failed = unit.write_report.failures.len(),
            "site written"
        );
        Ok(())
    }
}
