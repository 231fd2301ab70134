//! Build orchestration.
//!
//! Every target becomes a build unit: its resolved config, a document store,
//! a tree and the utilities named in its config. Stages run as a strict
//! barrier: all units finish a stage before any unit starts the next.
//!
//! ```text
//! collect ─► prepare
//!         ─► preprocess        extract sources into the store
//!         ─► postprocess       titles, destination names and dirs
//!         ─► finalize_content  destination paths
//!            (tree built from the store's files)
//!         ─► plug_holes        promote readmes, inject indexes
//!         ─► build_indexes     index listings, refreshed destinations
//!         ─► render_out        two-pass render
//!         ─► write_all         fan-out to every destination
//! ```
//!
//! Within a stage each unit runs its utilities in configured order.

use crate::config::{self, BuildConfig, ConfigError};
use crate::plug::PlugAction;
use crate::render::{RenderError, RenderFailure, Renderer};
use crate::scan::SkippedFile;
use crate::store::DocumentStore;
use crate::tree::Tree;
use crate::utility::{self, Utility};
use crate::write::{SiteWriter, WriteError, WriteReport};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot run {0}: finalize_content has not completed")]
    NotFinalized(Stage),
    #[error("Cannot run {stage}: expected {expected}")]
    OutOfOrder { stage: Stage, expected: String },
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    Preprocess,
    Postprocess,
    FinalizeContent,
    PlugHoles,
    BuildIndexes,
    RenderOut,
    WriteAll,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Prepare,
        Stage::Preprocess,
        Stage::Postprocess,
        Stage::FinalizeContent,
        Stage::PlugHoles,
        Stage::BuildIndexes,
        Stage::RenderOut,
        Stage::WriteAll,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Preprocess => "preprocess",
            Stage::Postprocess => "postprocess",
            Stage::FinalizeContent => "finalize_content",
            Stage::PlugHoles => "plug_holes",
            Stage::BuildIndexes => "build_indexes",
            Stage::RenderOut => "render_out",
            Stage::WriteAll => "write_all",
        }
    }

    fn next_after(completed: Option<Stage>) -> Option<Stage> {
        match completed {
            None => Some(Stage::Prepare),
            Some(done) => Stage::ALL.iter().copied().find(|s| *s > done),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs to a run.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Targets to build; the working directory when empty.
    pub targets: Vec<PathBuf>,
    /// Shared config layered below each target's own config.
    pub master_config: Option<PathBuf>,
    /// `KEY=VALUE` overrides layered above everything else.
    pub overrides: Vec<String>,
    /// Utility names used when a config names none.
    pub default_utilities: Vec<String>,
    /// Directory relative targets resolve against.
    pub cwd: PathBuf,
}

impl GeneratorOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            targets: Vec::new(),
            master_config: None,
            overrides: Vec::new(),
            default_utilities: utility::DEFAULT_UTILITIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cwd: cwd.into(),
        }
    }

    pub fn target(mut self, target: impl Into<PathBuf>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn set(mut self, assignment: impl Into<String>) -> Self {
        self.overrides.push(assignment.into());
        self
    }
}

/// Everything one build unit knows. Utilities read and extend it stage by stage.
pub struct UnitState {
    pub config: Arc<BuildConfig>,
    /// The other units of the run, read-only.
    pub others: Vec<Arc<BuildConfig>>,
    pub store: DocumentStore,
    pub tree: Tree,
    pub discovered: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
    pub plug_actions: Vec<PlugAction>,
    pub render_failures: Vec<RenderFailure>,
    pub write_report: WriteReport,
}

impl UnitState {
    fn new(config: Arc<BuildConfig>) -> Self {
        let root = config.root_path();
        Self {
            store: DocumentStore::new(config.name()),
            tree: Tree::new(root),
            config,
            others: Vec::new(),
            discovered: Vec::new(),
            skipped: Vec::new(),
            plug_actions: Vec::new(),
            render_failures: Vec::new(),
            write_report: WriteReport::default(),
        }
    }

    /// Rebuild the tree from the store's site files.
    pub fn rebuild_tree(&mut self) {
        let root = self.config.root_path();
        self.tree = Tree::build(&root, self.store.files().map(|d| d.source_path.as_path()));
        tracing::debug!(unit = %self.config.name(), nodes = self.tree.len(), "tree built");
    }
}

/// One target with its state and utilities.
pub struct BuildUnit {
    pub state: UnitState,
    utility_names: Vec<String>,
    utilities: Vec<Box<dyn Utility>>,
}

impl BuildUnit {
    pub fn utility_names(&self) -> &[String] {
        &self.utility_names
    }

    fn run_stage(&mut self, stage: Stage) -> Result<(), BuildError> {
        let state = &mut self.state;
        match stage {
            Stage::PlugHoles => state.rebuild_tree(),
            Stage::RenderOut => {
                let renderer = Renderer::for_config(&state.config, &state.others)?;
                for utility in &mut self.utilities {
                    utility.render_out(state, &renderer)?;
                }
                return Ok(());
            }
            Stage::WriteAll => {
                let writer = SiteWriter::new();
                for utility in &mut self.utilities {
                    utility.write_all(state, &writer)?;
                }
                return Ok(());
            }
            _ => {}
        }

        for utility in &mut self.utilities {
            match stage {
                Stage::Prepare => utility.prepare(state)?,
                Stage::Preprocess => utility.preprocess(state)?,
                Stage::Postprocess => utility.postprocess(state)?,
                Stage::FinalizeContent => utility.finalize_content(state)?,
                Stage::PlugHoles => utility.plug_holes(state)?,
                Stage::BuildIndexes => utility.build_indexes(state)?,
                Stage::RenderOut | Stage::WriteAll => {}
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> BuildSummary {
        let state = &self.state;
        BuildSummary {
            name: state.config.name(),
            root: state.config.root_path(),
            output_dirs: state.config.output_dirs(),
            documents: state.store.files().count(),
            synthetic: state.store.files().filter(|d| d.is_synthetic()).count(),
            skipped: state.skipped.clone(),
            render_failures: state.render_failures.clone(),
            write: state.write_report.clone(),
        }
    }
}

/// Result of building one unit.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub name: String,
    pub root: PathBuf,
    pub output_dirs: Vec<PathBuf>,
    pub documents: usize,
    pub synthetic: usize,
    pub skipped: Vec<SkippedFile>,
    pub render_failures: Vec<RenderFailure>,
    pub write: WriteReport,
}

impl BuildSummary {
    /// Any document failed to render or write.
    pub fn has_failures(&self) -> bool {
        !self.render_failures.is_empty() || !self.write.failures.is_empty()
    }
}

/// Runs build units through the stages.
pub struct Generator {
    units: Vec<BuildUnit>,
    completed: Option<Stage>,
}

impl Generator {
    /// Resolve every target and run `prepare`. Any error here is fatal.
    pub fn collect(options: GeneratorOptions) -> Result<Self, BuildError> {
        let master: Option<Value> = match &options.master_config {
            Some(path) => Some(config::load_and_repoint(&options.cwd.join(path))?.1),
            None => None,
        };
        let explicit = config::overrides_layer(&options.overrides)?;

        let targets = if options.targets.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            options.targets.clone()
        };

        let configs: Vec<Arc<BuildConfig>> = targets
            .iter()
            .map(|t| BuildConfig::resolve(t, &options.cwd, &explicit, master.as_ref()).map(Arc::new))
            .collect::<Result<_, _>>()?;

        let mut units = Vec::with_capacity(configs.len());
        let mut previous: Vec<String> = Vec::new();
        for (i, cfg) in configs.iter().enumerate() {
            let names =
                config::resolve_utility_names(&cfg.settings, &options.default_utilities, &previous);
            let utilities = utility::build_utilities(&names, cfg)?;
            tracing::debug!(unit = %cfg.name(), utilities = ?names, "unit collected");

            let mut state = UnitState::new(Arc::clone(cfg));
            state.others = configs
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| Arc::clone(other))
                .collect();

            previous = names.clone();
            units.push(BuildUnit {
                state,
                utility_names: names,
                utilities,
            });
        }

        let mut generator = Self {
            units,
            completed: None,
        };
        generator.run_stage(Stage::Prepare)?;
        Ok(generator)
    }

    pub fn units(&self) -> &[BuildUnit] {
        &self.units
    }

    /// Mutable access between stages, for callers that seed or inspect state.
    pub fn units_mut(&mut self) -> &mut [BuildUnit] {
        &mut self.units
    }

    /// Last stage every unit has finished.
    pub fn completed(&self) -> Option<Stage> {
        self.completed
    }

    /// Run exactly one stage across all units. Stages must run in order.
    pub fn run_stage(&mut self, stage: Stage) -> Result<(), BuildError> {
        if stage == Stage::PlugHoles
            && self.completed.is_none_or(|done| done < Stage::FinalizeContent)
        {
            return Err(BuildError::NotFinalized(stage));
        }
        let expected = Stage::next_after(self.completed);
        if expected != Some(stage) {
            return Err(BuildError::OutOfOrder {
                stage,
                expected: expected.map_or("nothing (all stages done)".to_string(), |s| s.to_string()),
            });
        }

        tracing::info!(stage = %stage, units = self.units.len(), "running stage");
        for unit in &mut self.units {
            unit.run_stage(stage)?;
        }
        self.completed = Some(stage);
        Ok(())
    }

    /// Run every remaining stage up to and including `stage`.
    pub fn run_through(&mut self, stage: Stage) -> Result<(), BuildError> {
        for next in Stage::ALL {
            if next > stage {
                break;
            }
            if self.completed.is_some_and(|done| next <= done) {
                continue;
            }
            self.run_stage(next)?;
        }
        Ok(())
    }

    /// Run all stages and summarise each unit.
    pub fn run(mut self) -> Result<Vec<BuildSummary>, BuildError> {
        self.run_through(Stage::WriteAll)?;
        Ok(self.summaries())
    }

    pub fn summaries(&self) -> Vec<BuildSummary> {
        self.units.iter().map(BuildUnit::summary).collect()
    }
}
