use crate::grid::Grid;
use crate::types::{CellMask, GridRadError, GridRadResult};
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Thresholds for removing low-confidence observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceFilterParams {
    /// Bin weight threshold (dimensionless)
    pub weight_threshold: f32,
    /// Echo frequency threshold (dimensionless)
    pub echo_frequency_threshold: f32,
    /// Reflectivity threshold (dBZ)
    pub reflectivity_threshold: f32,
    /// Number of observations threshold
    pub nobs_threshold: u32,
}

impl Default for ConfidenceFilterParams {
    fn default() -> Self {
        Self {
            weight_threshold: 1.5,
            echo_frequency_threshold: 0.6,
            reflectivity_threshold: 15.0,
            nobs_threshold: 2,
        }
    }
}

impl ConfidenceFilterParams {
    pub fn validate(&self) -> GridRadResult<()> {
        let checks = [
            ("weight_threshold", self.weight_threshold),
            ("echo_frequency_threshold", self.echo_frequency_threshold),
            ("reflectivity_threshold", self.reflectivity_threshold),
        ];

        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(GridRadError::Config(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// Removes cells with low bin weight and weak echo, or with low echo
/// frequency despite repeated observation
pub struct ConfidenceFilter {
    params: ConfidenceFilterParams,
}

impl ConfidenceFilter {
    /// Create a filter with default thresholds
    pub fn new() -> Self {
        Self {
            params: ConfidenceFilterParams::default(),
        }
    }

    /// Create a filter with custom thresholds, rejecting invalid ones
    pub fn with_params(params: ConfidenceFilterParams) -> GridRadResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ConfidenceFilterParams {
        &self.params
    }

    /// Mark cells whose observations are not trustworthy.
    ///
    /// Missing reflectivity or weight never satisfies a comparison.
    pub fn low_confidence_mask(&self, grid: &Grid) -> CellMask {
        let p = &self.params;
        let reflectivity = grid.reflectivity();
        let echo_frequency = grid.echo_frequency();
        let mut mask = CellMask::from_elem(grid.shape(), false);

        Zip::from(&mut mask)
            .and(reflectivity.values())
            .and(reflectivity.weights())
            .and(&echo_frequency)
            .and(grid.observation_count())
            .for_each(|marked, &z, &weight, &freq, &nobs| {
                let weak_and_light = !z.is_nan()
                    && !weight.is_nan()
                    && weight < p.weight_threshold
                    && z < p.reflectivity_threshold;
                let rarely_echoing = freq < p.echo_frequency_threshold && nobs > p.nobs_threshold;
                *marked = weak_and_light || rarely_echoing;
            });

        mask
    }

    /// Null low-confidence cells in every value field
    pub fn apply(&self, mut grid: Grid) -> GridRadResult<Grid> {
        log::info!(
            "Applying confidence filter to {:?} grid (wthresh={}, freq_thresh={}, Z_H_thresh={}, nobs_thresh={})",
            grid.shape(),
            self.params.weight_threshold,
            self.params.echo_frequency_threshold,
            self.params.reflectivity_threshold,
            self.params.nobs_threshold
        );

        grid.check_shapes("confidence filter")?;

        if grid.observation_count().iter().all(|&n| n == 0) {
            log::warn!("Grid has no observations, skipping confidence filter");
            return Ok(grid);
        }

        let mask = self.low_confidence_mask(&grid);
        let flagged = mask.iter().filter(|&&m| m).count();
        let nulled = grid.null_cells(&mask, "confidence filter")?;

        log::info!(
            "Confidence filter flagged {} cells, removed {} reflectivity observations",
            flagged,
            nulled
        );
        Ok(grid)
    }
}

impl Default for ConfidenceFilter {
    fn default() -> Self {
        Self::new()
    }
}
