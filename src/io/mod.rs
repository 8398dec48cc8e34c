//! I/O modules: sparse archive expansion and the archive reader boundary

pub mod archive;
pub mod sparse;

pub use archive::{check_input_file, ArchiveSource};
#[cfg(feature = "netcdf")]
pub use archive::NetCdfArchive;
pub use sparse::{SparseArchive, SparseIndexExpander, SparseVariable};
