//! Python bindings

use crate::core::{ClutterRemover, ConfidenceFilter, ConfidenceFilterParams, DeclutterParams};
use crate::grid::Grid;
use crate::io::SparseArchive;
use crate::types::*;
use numpy::{PyArray2, PyArray3, PyReadonlyArray1, ToPyArray};
use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::BTreeMap;

fn to_py_err(e: GridRadError) -> PyErr {
    match e {
        GridRadError::InputNotFound(_) => PyErr::new::<PyFileNotFoundError, _>(format!("{}", e)),
        GridRadError::Config(_) | GridRadError::MalformedInput(_) | GridRadError::IndexOutOfRange { .. } => {
            PyErr::new::<PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<PyRuntimeError, _>(format!("{}", e)),
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyGrid>()?;
    m.add_function(wrap_pyfunction!(from_arrays, m)?)?;
    m.add_function(wrap_pyfunction!(filter, m)?)?;
    m.add_function(wrap_pyfunction!(remove_clutter, m)?)?;
    #[cfg(feature = "netcdf")]
    m.add_function(wrap_pyfunction!(read_file, m)?)?;
    Ok(())
}

/// Python wrapper for Grid
#[pyclass(name = "Grid")]
#[derive(Clone)]
struct PyGrid {
    inner: Grid,
}

#[pymethods]
impl PyGrid {
    #[getter]
    fn shape(&self) -> (usize, usize, usize) {
        self.inner.shape()
    }

    #[getter]
    fn has_doppler(&self) -> bool {
        self.inner.has_doppler()
    }

    #[getter]
    fn has_dual_pol(&self) -> bool {
        self.inner.has_dual_pol()
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.metadata().name()
    }

    #[getter]
    fn analysis_time(&self) -> String {
        self.inner.metadata().analysis_time.clone()
    }

    #[getter]
    fn altitude(&self) -> Vec<f64> {
        self.inner.altitude().values().to_vec()
    }

    fn reflectivity<'py>(&self, py: Python<'py>) -> &'py PyArray3<f32> {
        self.inner.reflectivity().values().to_pyarray(py)
    }

    fn spectrum_width<'py>(&self, py: Python<'py>) -> &'py PyArray3<f32> {
        self.inner.spectrum_width().values().to_pyarray(py)
    }

    fn column_max<'py>(&self, py: Python<'py>) -> &'py PyArray2<f32> {
        self.inner.column_max_reflectivity().to_pyarray(py)
    }

    fn __repr__(&self) -> String {
        format!(
            "Grid(shape={:?}, doppler={}, dual_pol={})",
            self.inner.shape(),
            self.inner.has_doppler(),
            self.inner.has_dual_pol()
        )
    }
}

fn axis_from(kind: AxisKind, values: PyReadonlyArray1<f64>) -> PyResult<Axis> {
    let values = values.as_array().to_vec();
    let delta = if values.len() > 1 { values[1] - values[0] } else { 0.0 };
    let units = if kind == AxisKind::Altitude { "km" } else { "degrees" };
    Axis::new(kind, values, delta, units, kind.to_string()).map_err(to_py_err)
}

fn paired(
    name: &str,
    values: Option<PyReadonlyArray1<f32>>,
    weights: Option<PyReadonlyArray1<f32>>,
) -> PyResult<Option<(Vec<f32>, Vec<f32>)>> {
    match (values, weights) {
        (Some(v), Some(w)) => Ok(Some((v.as_array().to_vec(), w.as_array().to_vec()))),
        (None, None) => Ok(None),
        _ => Err(PyErr::new::<PyValueError, _>(format!(
            "{} and {} must be given together",
            name,
            weight_variable_name(name)
        ))),
    }
}

/// Build a grid from sparse arrays.
///
/// Doppler (`azimuthal_shear`, `divergence`) and dual-polarization
/// (`differential_reflectivity`, `differential_phase`, `correlation_coefficient`)
/// arrays are optional keywords, each with its `w_` weight array; a family
/// must be given complete or not at all.
#[pyfunction]
#[pyo3(signature = (
    longitude, latitude, altitude, index,
    reflectivity, w_reflectivity, spectrum_width, w_spectrum_width,
    nradobs, nradecho,
    azimuthal_shear=None, w_azimuthal_shear=None,
    divergence=None, w_divergence=None,
    differential_reflectivity=None, w_differential_reflectivity=None,
    differential_phase=None, w_differential_phase=None,
    correlation_coefficient=None, w_correlation_coefficient=None,
))]
#[allow(clippy::too_many_arguments)]
fn from_arrays(
    longitude: PyReadonlyArray1<f64>,
    latitude: PyReadonlyArray1<f64>,
    altitude: PyReadonlyArray1<f64>,
    index: PyReadonlyArray1<i64>,
    reflectivity: PyReadonlyArray1<f32>,
    w_reflectivity: PyReadonlyArray1<f32>,
    spectrum_width: PyReadonlyArray1<f32>,
    w_spectrum_width: PyReadonlyArray1<f32>,
    nradobs: PyReadonlyArray1<u32>,
    nradecho: PyReadonlyArray1<u32>,
    azimuthal_shear: Option<PyReadonlyArray1<f32>>,
    w_azimuthal_shear: Option<PyReadonlyArray1<f32>>,
    divergence: Option<PyReadonlyArray1<f32>>,
    w_divergence: Option<PyReadonlyArray1<f32>>,
    differential_reflectivity: Option<PyReadonlyArray1<f32>>,
    w_differential_reflectivity: Option<PyReadonlyArray1<f32>>,
    differential_phase: Option<PyReadonlyArray1<f32>>,
    w_differential_phase: Option<PyReadonlyArray1<f32>>,
    correlation_coefficient: Option<PyReadonlyArray1<f32>>,
    w_correlation_coefficient: Option<PyReadonlyArray1<f32>>,
) -> PyResult<PyGrid> {
    let mut archive = SparseArchive {
        longitude: axis_from(AxisKind::Longitude, longitude)?,
        latitude: axis_from(AxisKind::Latitude, latitude)?,
        altitude: axis_from(AxisKind::Altitude, altitude)?,
        index: index.as_array().to_vec(),
        variables: BTreeMap::new(),
        observation_count: nradobs.as_array().to_vec(),
        echo_count: nradecho.as_array().to_vec(),
        metadata: GridMetadata::default(),
    };

    archive.insert_variable(
        REFLECTIVITY,
        reflectivity.as_array().to_vec(),
        w_reflectivity.as_array().to_vec(),
    );
    archive.insert_variable(
        SPECTRUM_WIDTH,
        spectrum_width.as_array().to_vec(),
        w_spectrum_width.as_array().to_vec(),
    );

    let optional = [
        (AZIMUTHAL_SHEAR, azimuthal_shear, w_azimuthal_shear),
        (DIVERGENCE, divergence, w_divergence),
        (DIFFERENTIAL_REFLECTIVITY, differential_reflectivity, w_differential_reflectivity),
        (DIFFERENTIAL_PHASE, differential_phase, w_differential_phase),
        (CORRELATION_COEFFICIENT, correlation_coefficient, w_correlation_coefficient),
    ];
    for (name, values, weights) in optional {
        if let Some((values, weights)) = paired(name, values, weights)? {
            archive.insert_variable(name, values, weights);
        }
    }

    let inner = archive.expand().map_err(to_py_err)?;
    Ok(PyGrid { inner })
}

/// Remove low-confidence observations
#[pyfunction]
#[pyo3(signature = (grid, wthresh=1.5, freq_thresh=0.6, z_h_thresh=15.0, nobs_thresh=2))]
fn filter(grid: &PyGrid, wthresh: f32, freq_thresh: f32, z_h_thresh: f32, nobs_thresh: u32) -> PyResult<PyGrid> {
    let params = ConfidenceFilterParams {
        weight_threshold: wthresh,
        echo_frequency_threshold: freq_thresh,
        reflectivity_threshold: z_h_thresh,
        nobs_threshold: nobs_thresh,
    };
    let filter = ConfidenceFilter::with_params(params).map_err(to_py_err)?;
    let inner = filter.apply(grid.inner.clone()).map_err(to_py_err)?;
    Ok(PyGrid { inner })
}

/// Remove clutter and speckles
#[pyfunction]
#[pyo3(signature = (grid, skip_weak_ll_echo=false, areal_coverage_thresh=0.32))]
fn remove_clutter(grid: &PyGrid, skip_weak_ll_echo: bool, areal_coverage_thresh: f64) -> PyResult<PyGrid> {
    let params = DeclutterParams {
        areal_coverage_threshold: areal_coverage_thresh,
        skip_weak_low_level_echo: skip_weak_ll_echo,
        ..Default::default()
    };
    let remover = ClutterRemover::with_params(params).map_err(to_py_err)?;
    let inner = remover.apply(grid.inner.clone()).map_err(to_py_err)?;
    Ok(PyGrid { inner })
}

/// Read and expand a GridRad NetCDF file
#[cfg(feature = "netcdf")]
#[pyfunction]
fn read_file(path: String) -> PyResult<PyGrid> {
    use crate::io::{ArchiveSource, NetCdfArchive};

    let archive = NetCdfArchive
        .read_archive(std::path::Path::new(&path))
        .map_err(to_py_err)?;
    let inner = archive.expand().map_err(to_py_err)?;
    Ok(PyGrid { inner })
}
