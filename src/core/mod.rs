//! Core GridRad quality-control modules

pub mod masked;
pub mod confidence_filter;
pub mod declutter;
pub mod pipeline;

// Re-export main types
pub use masked::MaskedVolume;
pub use confidence_filter::{ConfidenceFilter, ConfidenceFilterParams};
pub use declutter::{
    areal_coverage, ClutterPass, ClutterRemover, ColumnProfile, DeclutterParams, DeclutterReport,
};
pub use pipeline::{load_and_process, Pipeline, PipelineConfig};
