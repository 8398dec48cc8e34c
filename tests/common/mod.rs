//! Synthetic GridRad archives for integration tests
#![allow(dead_code)]

use gridrad::types::*;
use gridrad::{SparseArchive, SparseVariable};
use ndarray::Array3;
use std::collections::BTreeMap;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn axis(kind: AxisKind, values: Vec<f64>) -> Axis {
    let delta = if values.len() > 1 { values[1] - values[0] } else { 1.0 };
    let units = if kind == AxisKind::Altitude { "km" } else { "degrees" };
    Axis::new(kind, values, delta, units, kind.to_string()).unwrap()
}

/// Sparse archive whose observed cells are the finite cells of `reflectivity`.
///
/// Every other variable repeats the reflectivity value except the correlation
/// coefficient, which is a constant 0.99.
pub fn archive_from_dense(
    altitudes: &[f64],
    reflectivity: &Array3<f32>,
    weight: f32,
    with_doppler: bool,
    with_dual_pol: bool,
) -> SparseArchive {
    let (nz, ny, nx) = reflectivity.dim();
    assert_eq!(nz, altitudes.len());

    let observed: Vec<(i64, f32)> = reflectivity
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(cell, &v)| (cell as i64, v))
        .collect();
    let index: Vec<i64> = observed.iter().map(|&(cell, _)| cell).collect();
    let values: Vec<f32> = observed.iter().map(|&(_, v)| v).collect();

    let mut names = vec![REFLECTIVITY, SPECTRUM_WIDTH];
    if with_doppler {
        names.extend([AZIMUTHAL_SHEAR, DIVERGENCE]);
    }
    if with_dual_pol {
        names.extend([DIFFERENTIAL_REFLECTIVITY, DIFFERENTIAL_PHASE, CORRELATION_COEFFICIENT]);
    }

    let variables: BTreeMap<String, SparseVariable> = names
        .into_iter()
        .map(|name| {
            let vals = if name == CORRELATION_COEFFICIENT {
                vec![0.99; values.len()]
            } else {
                values.clone()
            };
            let variable = SparseVariable {
                meta: VariableMeta::named(name),
                weights: vec![weight; vals.len()],
                values: vals,
            };
            (name.to_string(), variable)
        })
        .collect();

    SparseArchive {
        longitude: axis(AxisKind::Longitude, (0..nx).map(|i| -98.0 + 0.02 * i as f64).collect()),
        latitude: axis(AxisKind::Latitude, (0..ny).map(|j| 36.0 + 0.02 * j as f64).collect()),
        altitude: axis(AxisKind::Altitude, altitudes.to_vec()),
        index,
        variables,
        observation_count: vec![4; nz * ny * nx],
        echo_count: vec![4; nz * ny * nx],
        metadata: GridMetadata {
            analysis_time: "2011-04-26T22:00:00Z".to_string(),
            ..Default::default()
        },
    }
}

/// Missing-cell pattern of every value field, in grid order
pub fn missing_patterns(grid: &gridrad::Grid) -> Vec<Vec<bool>> {
    grid.value_fields()
        .iter()
        .map(|f| f.values().iter().map(|v| v.is_nan()).collect())
        .collect()
}
