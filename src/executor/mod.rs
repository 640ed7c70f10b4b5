use crate::backend::paths::{flattened_label, relative_to_working_dir};
use crate::backend::Backend;
use crate::config::{BuildSettings, SourceConfig};
use crate::error::{Error, Result};
use crate::locator::{BackendLocator, CompilerLoader};
use crate::stale::{SourceFile, StaleSourceSet};
use crate::workspace::{SourceRootRegistry, Workspace};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, info_span, warn};

/// Counts for one run, over every translation unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A translation unit together with the files it still has to translate.
#[derive(Debug, Clone)]
pub struct PlannedUnit {
    pub unit: SourceConfig,
    pub stale: BTreeSet<SourceFile>,
}

/// Drives one run: picks the backend, prepares directories, and translates
/// every stale file of every unit in order.
pub struct Orchestrator<W: Workspace, R: SourceRootRegistry> {
    settings: BuildSettings,
    workspace: W,
    registry: R,
}

impl<W: Workspace, R: SourceRootRegistry> Orchestrator<W, R> {
    pub fn new(settings: BuildSettings, workspace: W, registry: R) -> Self {
        Orchestrator {
            settings,
            workspace,
            registry,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Computes the stale files of each unit without translating anything.
    pub fn plan(&self) -> Result<Vec<PlannedUnit>> {
        self.settings
            .translation_units()
            .into_iter()
            .map(|unit| {
                let set = StaleSourceSet::new(
                    &unit.include_patterns(),
                    &unit.excludes,
                    self.settings.stale_millis,
                )?;
                let stale = set.compute(&self.settings.source_dir, &self.settings.timestamp_dir)?;
                Ok(PlannedUnit { unit, stale })
            })
            .collect()
    }

    pub fn execute<L: CompilerLoader>(
        &mut self,
        locator: &mut BackendLocator<L>,
    ) -> Result<RunSummary> {
        let backend = locator.resolve(self.settings.compiler.as_deref())?;
        info!(
            backend = backend.name(),
            compiler = %backend.compiler().name,
            "using IDL compiler"
        );

        self.prepare_output_dir()?;
        if !self.workspace.exists(&self.settings.timestamp_dir) {
            self.workspace.create_dir_all(&self.settings.timestamp_dir)?;
        }

        let label = flattened_label(backend.working_dir(), &self.settings.output_dir);
        let span = info_span!("idl", output = %label);
        let _guard = span.enter();

        let mut summary = RunSummary::default();
        for planned in self.plan()? {
            if planned.stale.is_empty() {
                info!("Nothing to compile - all idl files are up to date");
                continue;
            }
            info!(
                "Processing {} grammar files to {}",
                planned.stale.len(),
                relative_to_working_dir(backend.working_dir(), &self.settings.output_dir)
            );
            for file in &planned.stale {
                summary.processed += 1;
                if self.translate(&backend, &planned.unit, file)? {
                    summary.succeeded += 1;
                    self.record_marker(file);
                } else {
                    summary.failed += 1;
                }
            }
        }

        debug!(?summary, "run finished");
        Ok(summary)
    }

    fn prepare_output_dir(&mut self) -> Result<()> {
        let output_dir = &self.settings.output_dir;
        if !self.workspace.exists(output_dir) {
            self.workspace.create_dir_all(output_dir)?;
        }
        if !self.workspace.is_dir(output_dir) || !self.workspace.is_writable(output_dir) {
            return Err(Error::NotWritable(output_dir.clone()));
        }
        self.registry.register(output_dir);
        Ok(())
    }

    fn include_dirs(&self) -> Vec<PathBuf> {
        std::iter::once(self.settings.source_dir.clone())
            .chain(self.settings.include_dirs.iter().cloned())
            .collect()
    }

    /// Returns whether the compiler accepted the file.
    fn translate(
        &self,
        backend: &Backend,
        unit: &SourceConfig,
        file: &SourceFile,
    ) -> Result<bool> {
        debug!("Processing: {}", file.path.display());
        let args = backend.build_arguments(
            &unit.backend_config(),
            &self.include_dirs(),
            &self.settings.output_dir,
            &file.path,
        )?;
        let result = backend.invoke(&args)?;
        Ok(result.succeeded)
    }

    fn record_marker(&self, file: &SourceFile) {
        let marker = file.marker_path(&self.settings.timestamp_dir);
        if let Err(err) = self.workspace.copy_file(&file.path, &marker) {
            warn!(
                "Failed to copy IDL file to timestamp directory: {} ({})",
                marker.display(),
                err
            );
        }
    }
}
