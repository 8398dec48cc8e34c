use chrono::{DateTime, NaiveDateTime, Utc};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Real-valued radar quantity stored in a grid cell
pub type GridValue = f32;

/// 3D volume of values (altitude x latitude x longitude)
pub type Volume = Array3<GridValue>;

/// 3D per-cell observation or echo counts
pub type CountVolume = Array3<u32>;

/// 3D boolean mask over grid cells (true = marked)
pub type CellMask = Array3<bool>;

/// 2D horizontal image (latitude x longitude)
pub type ColumnImage = Array2<GridValue>;

/// Sentinel for "no valid observation"
pub const MISSING: GridValue = GridValue::NAN;

// Variable names as they appear in GridRad archives
pub const REFLECTIVITY: &str = "Reflectivity";
pub const SPECTRUM_WIDTH: &str = "SpectrumWidth";
pub const AZIMUTHAL_SHEAR: &str = "AzShear";
pub const DIVERGENCE: &str = "Divergence";
pub const DIFFERENTIAL_REFLECTIVITY: &str = "DifferentialReflectivity";
pub const DIFFERENTIAL_PHASE: &str = "DifferentialPhase";
pub const CORRELATION_COEFFICIENT: &str = "CorrelationCoefficient";
pub const OBSERVATION_COUNT: &str = "Nradobs";
pub const ECHO_COUNT: &str = "Nradecho";

/// Every value variable a GridRad archive may carry, in archive order
pub const VALUE_VARIABLES: [&str; 7] = [
    REFLECTIVITY,
    SPECTRUM_WIDTH,
    AZIMUTHAL_SHEAR,
    DIVERGENCE,
    DIFFERENTIAL_REFLECTIVITY,
    DIFFERENTIAL_PHASE,
    CORRELATION_COEFFICIENT,
];

/// Name of the weight variable paired with a value variable
pub fn weight_variable_name(name: &str) -> String {
    format!("w{}", name)
}

/// Spatial dimensions of a GridRad volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisKind {
    Longitude,
    Latitude,
    Altitude,
}

impl std::fmt::Display for AxisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisKind::Longitude => write!(f, "Longitude"),
            AxisKind::Latitude => write!(f, "Latitude"),
            AxisKind::Altitude => write!(f, "Altitude"),
        }
    }
}

/// One coordinate axis of the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    kind: AxisKind,
    values: Vec<f64>,
    delta: f64,
    units: String,
    long_name: String,
}

impl Axis {
    /// Create an axis, checking that values are finite and strictly ascending
    pub fn new(
        kind: AxisKind,
        values: Vec<f64>,
        delta: f64,
        units: impl Into<String>,
        long_name: impl Into<String>,
    ) -> GridRadResult<Self> {
        if values.is_empty() {
            return Err(GridRadError::MalformedInput(format!("{} axis is empty", kind)));
        }

        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(GridRadError::MalformedInput(format!(
                "{} axis value at position {} is not finite",
                kind, pos
            )));
        }

        if let Some(pos) = values.windows(2).position(|w| w[1] <= w[0]) {
            return Err(GridRadError::MalformedInput(format!(
                "{} axis is not strictly ascending at position {} ({} -> {})",
                kind,
                pos + 1,
                values[pos],
                values[pos + 1]
            )));
        }

        Ok(Self {
            kind,
            values,
            delta,
            units: units.into(),
            long_name: long_name.into(),
        })
    }

    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Nominal spacing between coordinates
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the first coordinate at or above `value`
    pub fn index_at_or_above(&self, value: f64) -> Option<usize> {
        self.values.iter().position(|&v| v >= value)
    }
}

/// Descriptive attributes of a value variable and its weight channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMeta {
    pub name: String,
    pub long_name: String,
    pub units: String,
    pub weight_long_name: String,
    pub weight_units: String,
    /// Missing-value marker declared for the weight channel
    pub weight_missing: GridValue,
}

impl VariableMeta {
    /// Metadata with only the variable name filled in
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            long_name: String::new(),
            units: String::new(),
            weight_long_name: String::new(),
            weight_units: String::new(),
            weight_missing: MISSING,
        }
    }
}

/// A dense 3D radar quantity with its parallel weight array
#[derive(Debug, Clone)]
pub struct Field {
    meta: VariableMeta,
    values: Volume,
    weights: Volume,
}

impl Field {
    pub fn new(meta: VariableMeta, values: Volume, weights: Volume) -> GridRadResult<Self> {
        if values.dim() != weights.dim() {
            return Err(GridRadError::ShapeMismatch {
                stage: "field construction".to_string(),
                field: weight_variable_name(&meta.name),
                expected: values.dim(),
                found: weights.dim(),
            });
        }

        Ok(Self { meta, values, weights })
    }

    pub fn meta(&self) -> &VariableMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn units(&self) -> &str {
        &self.meta.units
    }

    pub fn values(&self) -> &Volume {
        &self.values
    }

    pub fn weights(&self) -> &Volume {
        &self.weights
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.values.dim()
    }

    /// The value sentinel used for missing cells
    pub fn missing(&self) -> GridValue {
        MISSING
    }

    pub fn is_missing(&self, cell: [usize; 3]) -> bool {
        self.values[cell].is_nan()
    }

    /// Number of cells holding a valid value
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Set values to missing wherever `mask` is true. Weights are untouched.
    pub(crate) fn null_where(&mut self, mask: &CellMask) {
        ndarray::Zip::from(&mut self.values)
            .and(mask)
            .for_each(|value, &marked| {
                if marked {
                    *value = MISSING;
                }
            });
    }
}

/// Fields derived from the Doppler velocity moment
#[derive(Debug, Clone)]
pub struct DopplerFields {
    pub azimuthal_shear: Field,
    pub divergence: Field,
}

/// Optional Doppler-derived family (azimuthal shear + divergence)
#[derive(Debug, Clone)]
pub enum DopplerFamily {
    Present(DopplerFields),
    Absent,
}

impl DopplerFamily {
    pub fn is_present(&self) -> bool {
        matches!(self, DopplerFamily::Present(_))
    }
}

/// Dual-polarization fields
#[derive(Debug, Clone)]
pub struct DualPolFields {
    pub differential_reflectivity: Field,
    pub differential_phase: Field,
    pub correlation_coefficient: Field,
}

/// Optional dual-polarization family (Z_DR, K_DP, rho_HV)
#[derive(Debug, Clone)]
pub enum DualPolFamily {
    Present(DualPolFields),
    Absent,
}

impl DualPolFamily {
    pub fn is_present(&self) -> bool {
        matches!(self, DualPolFamily::Present(_))
    }
}

/// Global attributes of a GridRad analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridMetadata {
    pub analysis_time: String,
    pub analysis_time_window: String,
    pub file_creation_date: String,
    pub grid_scheme: String,
    pub algorithm_version: String,
    pub algorithm_description: String,
    pub authors: String,
    pub project_sponsor: String,
    pub project_name: String,
    /// Radar sweeps merged into this analysis
    pub sweeps_merged: Vec<String>,
    /// File the analysis was read from, if any
    pub source: Option<PathBuf>,
}

impl GridMetadata {
    /// Human-readable product name
    pub fn name(&self) -> String {
        format!("GridRad analysis for {}", self.analysis_time)
    }

    /// Parse the analysis time (RFC 3339 or `YYYY-MM-DDTHH:MM:SSZ`)
    pub fn analysis_datetime(&self) -> GridRadResult<DateTime<Utc>> {
        let text = self.analysis_time.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                GridRadError::Metadata(format!(
                    "cannot parse analysis time '{}': {}",
                    self.analysis_time, e
                ))
            })
    }
}

/// Error types for GridRad processing
#[derive(Debug, thiserror::Error)]
pub enum GridRadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Sparse index value {value} at position {position} is outside a grid of {cells} cells")]
    IndexOutOfRange {
        position: usize,
        value: i64,
        cells: usize,
    },

    #[error("Shape mismatch in {stage}: {field} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        stage: String,
        field: String,
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Result type for GridRad operations
pub type GridRadResult<T> = Result<T, GridRadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_axis_rejects_non_monotonic_values() {
        let result = Axis::new(AxisKind::Altitude, vec![1.0, 2.0, 2.0], 1.0, "km", "Altitude");
        match result {
            Err(GridRadError::MalformedInput(msg)) => assert!(msg.contains("position 2")),
            other => panic!("expected malformed input, got {:?}", other),
        }

        assert!(Axis::new(AxisKind::Longitude, vec![], 0.02, "degrees", "Longitude").is_err());
        assert!(Axis::new(AxisKind::Latitude, vec![1.0, f64::NAN], 0.02, "degrees", "Latitude").is_err());
    }

    #[test]
    fn test_axis_index_at_or_above() {
        let axis = Axis::new(AxisKind::Altitude, vec![1.0, 2.5, 4.0, 5.5], 1.5, "km", "Altitude").unwrap();
        assert_eq!(axis.index_at_or_above(4.0), Some(2));
        assert_eq!(axis.index_at_or_above(3.0), Some(2));
        assert_eq!(axis.index_at_or_above(0.0), Some(0));
        assert_eq!(axis.index_at_or_above(6.0), None);
    }

    #[test]
    fn test_field_rejects_weight_shape_mismatch() {
        let result = Field::new(
            VariableMeta::named(REFLECTIVITY),
            Volume::zeros((2, 3, 4)),
            Volume::zeros((2, 3, 3)),
        );
        assert!(matches!(result, Err(GridRadError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_null_where_leaves_weights() {
        let mut field = Field::new(
            VariableMeta::named(REFLECTIVITY),
            Volume::from_elem((1, 2, 2), 20.0),
            Volume::from_elem((1, 2, 2), 3.0),
        )
        .unwrap();

        let mut mask = CellMask::from_elem((1, 2, 2), false);
        mask[[0, 1, 0]] = true;
        field.null_where(&mask);

        assert!(field.is_missing([0, 1, 0]));
        assert_eq!(field.valid_count(), 3);
        assert!(field.weights().iter().all(|&w| w == 3.0));
    }

    #[test]
    fn test_analysis_datetime_parsing() {
        let meta = GridMetadata {
            analysis_time: "2011-04-26T22:00:00Z".to_string(),
            ..Default::default()
        };
        let dt = meta.analysis_datetime().unwrap();
        assert_eq!(dt.year(), 2011);
        assert_eq!(dt.hour(), 22);
        assert_eq!(meta.name(), "GridRad analysis for 2011-04-26T22:00:00Z");

        let bad = GridMetadata {
            analysis_time: "yesterday".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad.analysis_datetime(), Err(GridRadError::Metadata(_))));
    }
}
