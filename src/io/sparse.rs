//! Expansion of index-compressed GridRad volumes into dense grids.
//!
//! Archives store only the observed cells: a flat `index` of row-major,
//! altitude-major cell positions, and for each variable a flat array holding
//! one value per index entry. All variables share the same index.

use crate::grid::{Grid, GridParts};
use crate::types::*;
use ndarray::Array3;
use num_traits::Float;
use std::collections::BTreeMap;

/// One variable as stored in the archive: a value and weight per observed cell
#[derive(Debug, Clone)]
pub struct SparseVariable {
    pub meta: VariableMeta,
    pub values: Vec<GridValue>,
    pub weights: Vec<GridValue>,
}

/// Raw archive content handed over by the file collaborator
#[derive(Debug, Clone)]
pub struct SparseArchive {
    pub longitude: Axis,
    pub latitude: Axis,
    pub altitude: Axis,
    /// Flattened cell position of each observed cell
    pub index: Vec<i64>,
    /// Value variables keyed by archive name (e.g. "Reflectivity")
    pub variables: BTreeMap<String, SparseVariable>,
    /// Dense, flattened observation counts
    pub observation_count: Vec<u32>,
    /// Dense, flattened echo counts
    pub echo_count: Vec<u32>,
    pub metadata: GridMetadata,
}

impl SparseArchive {
    /// (n_altitude, n_latitude, n_longitude)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.altitude.len(), self.latitude.len(), self.longitude.len())
    }

    /// Add or replace a variable with default attributes
    pub fn insert_variable(&mut self, name: &str, values: Vec<GridValue>, weights: Vec<GridValue>) {
        self.variables.insert(
            name.to_string(),
            SparseVariable {
                meta: VariableMeta::named(name),
                values,
                weights,
            },
        );
    }

    pub fn has_doppler(&self) -> bool {
        self.variables.contains_key(AZIMUTHAL_SHEAR) && self.variables.contains_key(DIVERGENCE)
    }

    pub fn has_dual_pol(&self) -> bool {
        [DIFFERENTIAL_REFLECTIVITY, DIFFERENTIAL_PHASE, CORRELATION_COEFFICIENT]
            .iter()
            .all(|name| self.variables.contains_key(*name))
    }

    /// Expand every variable onto the dense grid, consuming the flat arrays
    pub fn expand(mut self) -> GridRadResult<Grid> {
        let shape = self.shape();
        log::info!(
            "Expanding {} observed cells onto a {}x{}x{} grid",
            self.index.len(),
            shape.0,
            shape.1,
            shape.2
        );

        let expander = SparseIndexExpander::new(shape, &self.index)?;
        if expander.observed_cells() == 0 {
            log::warn!("Archive contains no observed cells");
        }

        let mut take = |name: &str| self.variables.remove(name);

        let reflectivity = take(REFLECTIVITY)
            .ok_or_else(|| GridRadError::MalformedInput(format!("missing required variable {}", REFLECTIVITY)))?;
        let spectrum_width = take(SPECTRUM_WIDTH)
            .ok_or_else(|| GridRadError::MalformedInput(format!("missing required variable {}", SPECTRUM_WIDTH)))?;

        let doppler = match (take(AZIMUTHAL_SHEAR), take(DIVERGENCE)) {
            (Some(shear), Some(divergence)) => DopplerFamily::Present(DopplerFields {
                azimuthal_shear: expander.expand_variable(shear)?,
                divergence: expander.expand_variable(divergence)?,
            }),
            (None, None) => DopplerFamily::Absent,
            _ => {
                return Err(GridRadError::MalformedInput(format!(
                    "Doppler family is incomplete: {} and {} must both be present",
                    AZIMUTHAL_SHEAR, DIVERGENCE
                )))
            }
        };

        let dual_pol = match (
            take(DIFFERENTIAL_REFLECTIVITY),
            take(DIFFERENTIAL_PHASE),
            take(CORRELATION_COEFFICIENT),
        ) {
            (Some(zdr), Some(kdp), Some(rho)) => DualPolFamily::Present(DualPolFields {
                differential_reflectivity: expander.expand_variable(zdr)?,
                differential_phase: expander.expand_variable(kdp)?,
                correlation_coefficient: expander.expand_variable(rho)?,
            }),
            (None, None, None) => DualPolFamily::Absent,
            _ => {
                return Err(GridRadError::MalformedInput(format!(
                    "dual-polarization family is incomplete: {}, {} and {} must all be present",
                    DIFFERENTIAL_REFLECTIVITY, DIFFERENTIAL_PHASE, CORRELATION_COEFFICIENT
                )))
            }
        };

        if !self.variables.is_empty() {
            log::debug!(
                "Ignoring unrecognised variables: {:?}",
                self.variables.keys().collect::<Vec<_>>()
            );
        }

        let reflectivity = expander.expand_variable(reflectivity)?;
        let spectrum_width = expander.expand_variable(spectrum_width)?;

        Grid::from_parts(GridParts {
            longitude: self.longitude,
            latitude: self.latitude,
            altitude: self.altitude,
            reflectivity,
            spectrum_width,
            doppler,
            dual_pol,
            observation_count: dense_counts(OBSERVATION_COUNT, self.observation_count, shape)?,
            echo_count: dense_counts(ECHO_COUNT, self.echo_count, shape)?,
            metadata: self.metadata,
        })
    }
}

fn dense_counts(name: &str, counts: Vec<u32>, shape: (usize, usize, usize)) -> GridRadResult<CountVolume> {
    let expected = shape.0 * shape.1 * shape.2;
    if counts.len() != expected {
        return Err(GridRadError::MalformedInput(format!(
            "{} holds {} values, grid has {} cells",
            name,
            counts.len(),
            expected
        )));
    }

    CountVolume::from_shape_vec(shape, counts)
        .map_err(|e| GridRadError::MalformedInput(format!("{}: {}", name, e)))
}

/// Validated scatter map from observed-cell positions into a dense grid
#[derive(Debug, Clone)]
pub struct SparseIndexExpander {
    shape: (usize, usize, usize),
    positions: Vec<usize>,
}

impl SparseIndexExpander {
    /// Check every index entry against the grid size
    pub fn new(shape: (usize, usize, usize), index: &[i64]) -> GridRadResult<Self> {
        let cells = shape.0 * shape.1 * shape.2;
        if cells == 0 {
            return Err(GridRadError::MalformedInput(format!(
                "grid shape {:?} has no cells",
                shape
            )));
        }

        let positions = index
            .iter()
            .enumerate()
            .map(|(position, &value)| match usize::try_from(value) {
                Ok(cell) if cell < cells => Ok(cell),
                _ => Err(GridRadError::IndexOutOfRange {
                    position,
                    value,
                    cells,
                }),
            })
            .collect::<GridRadResult<Vec<_>>>()?;

        Ok(Self { shape, positions })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    /// Number of observed cells (length of the index)
    pub fn observed_cells(&self) -> usize {
        self.positions.len()
    }

    /// Place `values[n]` at cell `index[n]`; every other cell gets `fill`
    pub fn scatter<T: Copy>(&self, name: &str, values: &[T], fill: T) -> GridRadResult<Array3<T>> {
        if values.len() != self.positions.len() {
            return Err(GridRadError::MalformedInput(format!(
                "{} holds {} values, index holds {} entries",
                name,
                values.len(),
                self.positions.len()
            )));
        }

        let mut dense = Array3::from_elem(self.shape, fill);
        if let Some(flat) = dense.as_slice_mut() {
            for (&cell, &value) in self.positions.iter().zip(values) {
                flat[cell] = value;
            }
        }
        Ok(dense)
    }

    /// Scatter values, leaving unobserved cells NaN
    pub fn expand_values<T: Float>(&self, name: &str, values: &[T]) -> GridRadResult<Array3<T>> {
        self.scatter(name, values, T::nan())
    }

    /// Scatter weights, leaving unobserved cells at zero weight
    pub fn expand_weights<T: Float>(&self, name: &str, weights: &[T]) -> GridRadResult<Array3<T>> {
        self.scatter(name, weights, T::zero())
    }

    /// Read dense cells back out at the index positions
    pub fn gather<T: Copy>(&self, dense: &Array3<T>) -> GridRadResult<Vec<T>> {
        if dense.dim() != self.shape {
            return Err(GridRadError::ShapeMismatch {
                stage: "sparse gather".to_string(),
                field: "dense array".to_string(),
                expected: self.shape,
                found: dense.dim(),
            });
        }

        let (_, ny, nx) = self.shape;
        Ok(self
            .positions
            .iter()
            .map(|&cell| dense[[cell / (ny * nx), (cell / nx) % ny, cell % nx]])
            .collect())
    }

    /// Expand one archive variable into a dense field
    pub fn expand_variable(&self, variable: SparseVariable) -> GridRadResult<Field> {
        let SparseVariable { meta, values, weights } = variable;
        let dense_values = self.expand_values(&meta.name, &values)?;
        let dense_weights = self.expand_weights(&weight_variable_name(&meta.name), &weights)?;
        Field::new(meta, dense_values, dense_weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(kind: AxisKind, n: usize) -> Axis {
        Axis::new(kind, (0..n).map(|v| v as f64 + 1.0).collect(), 1.0, "", "").unwrap()
    }

    fn variable(name: &str, values: Vec<GridValue>) -> SparseVariable {
        let weights = vec![2.0; values.len()];
        SparseVariable {
            meta: VariableMeta::named(name),
            values,
            weights,
        }
    }

    fn archive(index: Vec<i64>, names: &[&str]) -> SparseArchive {
        let m = index.len();
        SparseArchive {
            longitude: axis(AxisKind::Longitude, 3),
            latitude: axis(AxisKind::Latitude, 2),
            altitude: axis(AxisKind::Altitude, 2),
            index,
            variables: names
                .iter()
                .map(|name| (name.to_string(), variable(name, (0..m).map(|v| v as GridValue).collect())))
                .collect(),
            observation_count: vec![1; 12],
            echo_count: vec![1; 12],
            metadata: GridMetadata::default(),
        }
    }

    #[test]
    fn test_scatter_places_values_altitude_major() {
        let expander = SparseIndexExpander::new((2, 2, 3), &[0, 5, 7]).unwrap();
        let dense = expander.expand_values("Reflectivity", &[10.0f32, 20.0, 30.0]).unwrap();

        assert_eq!(dense[[0, 0, 0]], 10.0);
        assert_eq!(dense[[0, 1, 2]], 20.0);
        assert_eq!(dense[[1, 0, 1]], 30.0);
        assert_eq!(dense.iter().filter(|v| v.is_nan()).count(), 9);

        let weights = expander.expand_weights("wReflectivity", &[1.0f32, 1.0, 1.0]).unwrap();
        assert_eq!(weights.sum(), 3.0);
    }

    #[test]
    fn test_index_out_of_range_reports_position() {
        match SparseIndexExpander::new((2, 2, 3), &[0, 12]) {
            Err(GridRadError::IndexOutOfRange { position, value, cells }) => {
                assert_eq!((position, value, cells), (1, 12, 12));
            }
            other => panic!("expected out-of-range error, got {:?}", other),
        }
        assert!(SparseIndexExpander::new((2, 2, 3), &[-1]).is_err());
    }

    #[test]
    fn test_value_length_mismatch_is_malformed() {
        let expander = SparseIndexExpander::new((1, 1, 4), &[0, 1]).unwrap();
        assert!(matches!(
            expander.expand_values("Reflectivity", &[1.0f32]),
            Err(GridRadError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_expand_archive_without_optional_families() {
        let grid = archive(vec![0, 4, 11], &[REFLECTIVITY, SPECTRUM_WIDTH]).expand().unwrap();
        assert_eq!(grid.shape(), (2, 2, 3));
        assert!(!grid.has_doppler());
        assert!(!grid.has_dual_pol());
        assert_eq!(grid.reflectivity().valid_count(), 3);
        assert_eq!(grid.reflectivity().values()[[1, 1, 2]], 2.0);
    }

    #[test]
    fn test_expand_archive_with_all_families() {
        let grid = archive(vec![3, 6], &VALUE_VARIABLES).expand().unwrap();
        assert!(grid.has_doppler());
        assert!(grid.has_dual_pol());
        assert_eq!(grid.value_fields().len(), 7);
    }

    #[test]
    fn test_inserted_doppler_family_expands() {
        let mut archive = archive(vec![1, 8], &[REFLECTIVITY, SPECTRUM_WIDTH]);
        archive.insert_variable(AZIMUTHAL_SHEAR, vec![0.004, -0.002], vec![2.0, 2.0]);
        assert!(!archive.has_doppler());
        archive.insert_variable(DIVERGENCE, vec![0.001, 0.003], vec![2.0, 2.0]);
        assert!(archive.has_doppler());

        let grid = archive.expand().unwrap();
        match grid.doppler() {
            DopplerFamily::Present(fields) => {
                assert_eq!(fields.azimuthal_shear.values()[[0, 0, 1]], 0.004);
                assert_eq!(fields.divergence.values()[[1, 0, 2]], 0.003);
                assert_eq!(fields.divergence.weights()[[0, 0, 0]], 0.0);
            }
            DopplerFamily::Absent => panic!("expected Doppler fields"),
        }
        assert!(!grid.has_dual_pol());
    }

    #[test]
    fn test_partial_family_is_malformed() {
        let result = archive(vec![0], &[REFLECTIVITY, SPECTRUM_WIDTH, AZIMUTHAL_SHEAR]).expand();
        assert!(matches!(result, Err(GridRadError::MalformedInput(_))));

        let result = archive(
            vec![0],
            &[REFLECTIVITY, SPECTRUM_WIDTH, DIFFERENTIAL_REFLECTIVITY, CORRELATION_COEFFICIENT],
        )
        .expand();
        assert!(matches!(result, Err(GridRadError::MalformedInput(_))));
    }

    #[test]
    fn test_missing_reflectivity_is_malformed() {
        let result = archive(vec![0], &[SPECTRUM_WIDTH]).expand();
        assert!(matches!(result, Err(GridRadError::MalformedInput(_))));
    }

    #[test]
    fn test_count_length_mismatch_is_malformed() {
        let mut bad = archive(vec![0], &[REFLECTIVITY, SPECTRUM_WIDTH]);
        bad.echo_count.pop();
        assert!(matches!(bad.expand(), Err(GridRadError::MalformedInput(_))));
    }
}
