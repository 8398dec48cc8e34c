use crate::core::confidence_filter::{ConfidenceFilter, ConfidenceFilterParams};
use crate::core::declutter::{ClutterRemover, DeclutterParams};
use crate::grid::Grid;
use crate::io::archive::ArchiveSource;
use crate::io::sparse::SparseArchive;
use crate::types::GridRadResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which quality-control stages to run and with what parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Remove low-confidence observations
    pub filter_low_confidence: bool,
    /// Remove clutter and speckles
    pub remove_clutter: bool,
    pub filter: ConfidenceFilterParams,
    pub declutter: DeclutterParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter_low_confidence: true,
            remove_clutter: true,
            filter: ConfidenceFilterParams::default(),
            // Whole-file processing leaves the weak low-level echo checks off
            declutter: DeclutterParams {
                skip_weak_low_level_echo: true,
                ..DeclutterParams::default()
            },
        }
    }
}

/// Expansion followed by the quality-control stages, in order
pub struct Pipeline {
    config: PipelineConfig,
    filter: ConfidenceFilter,
    remover: ClutterRemover,
}

impl Pipeline {
    /// Build a pipeline; every parameter is validated here, before any array work
    pub fn new(config: PipelineConfig) -> GridRadResult<Self> {
        let filter = ConfidenceFilter::with_params(config.filter.clone())?;
        let remover = ClutterRemover::with_params(config.declutter.clone())?;
        Ok(Self {
            config,
            filter,
            remover,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the enabled quality-control stages over a grid
    pub fn run(&self, grid: Grid) -> GridRadResult<Grid> {
        let mut grid = grid;

        if self.config.filter_low_confidence {
            grid = self.filter.apply(grid)?;
        } else {
            log::debug!("Confidence filter disabled");
        }

        if self.config.remove_clutter {
            grid = self.remover.apply(grid)?;
        } else {
            log::debug!("Clutter removal disabled");
        }

        Ok(grid)
    }

    /// Expand a sparse archive and run the quality-control stages
    pub fn process_archive(&self, archive: SparseArchive) -> GridRadResult<Grid> {
        let grid = archive.expand()?;
        self.run(grid)
    }

    /// Read, expand and quality-control one file
    pub fn process_file<S: ArchiveSource>(&self, source: &S, path: &Path) -> GridRadResult<Grid> {
        log::info!("Processing {}", path.display());
        let archive = source.read_archive(path)?;
        self.process_archive(archive)
    }
}

/// Load a file with `source` and run the pipeline described by `config`
pub fn load_and_process<S: ArchiveSource>(
    source: &S,
    path: &Path,
    config: PipelineConfig,
) -> GridRadResult<Grid> {
    Pipeline::new(config)?.process_file(source, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridRadError;

    #[test]
    fn test_config_errors_surface_at_construction() {
        let mut config = PipelineConfig::default();
        config.declutter.areal_coverage_threshold = f64::NAN;
        assert!(matches!(Pipeline::new(config), Err(GridRadError::Config(_))));

        let mut config = PipelineConfig::default();
        config.filter.echo_frequency_threshold = -0.1;
        assert!(matches!(Pipeline::new(config), Err(GridRadError::Config(_))));
    }

    #[test]
    fn test_default_config_enables_both_stages_without_weak_echo_checks() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        assert!(pipeline.config().filter_low_confidence);
        assert!(pipeline.config().remove_clutter);
        assert!(pipeline.config().declutter.skip_weak_low_level_echo);
        assert!(!DeclutterParams::default().skip_weak_low_level_echo);
    }
}
