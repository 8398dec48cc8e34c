//! gridrad: reconstruction and quality control of GridRad radar mosaics
//!
//! GridRad archives store a volumetric NEXRAD mosaic as a sparse list of
//! observed cells. This library expands them into dense (altitude, latitude,
//! longitude) grids and removes low-confidence observations, ground clutter,
//! biological scatterers and speckle noise.
//!
//! ```no_run
//! use gridrad::{Pipeline, PipelineConfig, SparseArchive};
//!
//! # fn run(archive: SparseArchive) -> gridrad::GridRadResult<()> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let grid = pipeline.process_archive(archive)?;
//! let column_max = grid.column_max_reflectivity();
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod grid;
pub mod io;
pub mod core;
pub mod render;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use crate::types::{
    Axis, AxisKind, Field, GridMetadata, GridRadError, GridRadResult, VariableMeta,
    DopplerFamily, DopplerFields, DualPolFamily, DualPolFields, MISSING,
};

pub use crate::grid::{Grid, GridParts};
pub use crate::io::{check_input_file, ArchiveSource, SparseArchive, SparseIndexExpander, SparseVariable};
#[cfg(feature = "netcdf")]
pub use crate::io::NetCdfArchive;
pub use crate::core::{
    load_and_process, ClutterPass, ClutterRemover, ConfidenceFilter, ConfidenceFilterParams,
    DeclutterParams, DeclutterReport, Pipeline, PipelineConfig,
};

/// Remove low-confidence observations using `params`
pub fn filter(grid: Grid, params: ConfidenceFilterParams) -> GridRadResult<Grid> {
    ConfidenceFilter::with_params(params)?.apply(grid)
}

/// Remove clutter and speckles using `params`
pub fn remove_clutter(grid: Grid, params: DeclutterParams) -> GridRadResult<Grid> {
    ClutterRemover::with_params(params)?.apply(grid)
}

/// Read a GridRad NetCDF file and expand it into a dense grid
#[cfg(feature = "netcdf")]
pub fn read_file(path: impl AsRef<std::path::Path>) -> GridRadResult<Grid> {
    NetCdfArchive.read_archive(path.as_ref())?.expand()
}
