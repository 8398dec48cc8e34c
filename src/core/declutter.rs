//! Clutter and speckle removal.
//!
//! Passes run in a fixed order, each reading the grid and the clutter mask
//! accumulated so far and returning the mask with its own detections added.
//! The finished mask is applied to every value field in a single step.

use crate::core::masked::MaskedVolume;
use crate::grid::Grid;
use crate::types::*;
use ndarray::{Array2, Array3, Zip};
use serde::{Deserialize, Serialize};

/// Top of the layer checked for weak low-level echo (km)
const LOW_LEVEL_TOP_KM: f64 = 4.0;

/// Altitude separating anvil echo from the layer beneath it (km)
const ANVIL_CUTOFF_KM: f64 = 4.0;

/// Widest accepted speckle neighborhood (cells)
pub const MAX_NEIGHBORHOOD_SIZE: usize = 101;

/// Altitude above which weak echo with reduced correlation is suspect (km)
const UPPER_LEVEL_BASE_KM: f64 = 10.0;

/// Clutter removal parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclutterParams {
    /// Fractional areal coverage at or below which an echo is a speckle
    pub areal_coverage_threshold: f64,
    /// Skip both weak low-level echo checks
    pub skip_weak_low_level_echo: bool,
    /// Width of the square horizontal neighborhood (must be odd)
    pub neighborhood_size: usize,
}

impl Default for DeclutterParams {
    fn default() -> Self {
        Self {
            areal_coverage_threshold: 0.32,
            skip_weak_low_level_echo: false,
            neighborhood_size: 5,
        }
    }
}

impl DeclutterParams {
    pub fn validate(&self) -> GridRadResult<()> {
        let threshold = self.areal_coverage_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(GridRadError::Config(format!(
                "areal_coverage_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        let size = self.neighborhood_size;
        if size == 0 || size % 2 == 0 || size > MAX_NEIGHBORHOOD_SIZE {
            return Err(GridRadError::Config(format!(
                "neighborhood_size must be an odd number in 1..={}, got {}",
                MAX_NEIGHBORHOOD_SIZE, size
            )));
        }

        Ok(())
    }
}

/// The individual clutter detection passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClutterPass {
    /// Low correlation coefficient (dual-pol grids only)
    CorrelationScreen,
    /// Echo with low fractional areal coverage
    ArealSpeckle,
    /// Weak echo in the lowest 4 km
    WeakEchoLevels,
    /// Columns whose echo is weak and/or shallow
    WeakEchoColumns,
    /// Echo trapped beneath a detached elevated layer
    AnvilClutter,
}

impl std::fmt::Display for ClutterPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClutterPass::CorrelationScreen => write!(f, "correlation screen"),
            ClutterPass::ArealSpeckle => write!(f, "areal speckle"),
            ClutterPass::WeakEchoLevels => write!(f, "weak low-level echo"),
            ClutterPass::WeakEchoColumns => write!(f, "weak/shallow echo columns"),
            ClutterPass::AnvilClutter => write!(f, "anvil clutter"),
        }
    }
}

/// What a clutter removal run did
#[derive(Debug, Clone, Default)]
pub struct DeclutterReport {
    /// Cells newly added to the mask by each pass, in run order
    pub marked_by_pass: Vec<(ClutterPass, usize)>,
    /// Valid reflectivity cells removed when the mask was applied
    pub cells_nulled: usize,
}

/// Vertical echo summary of one (latitude, longitude) column
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColumnProfile {
    /// Column-maximum reflectivity, `None` when no cell is valid
    pub max_reflectivity: Option<GridValue>,
    /// Lowest altitude with echo > 0 dBZ
    pub echo0_min: f64,
    /// Highest altitude with echo > 0 dBZ
    pub echo0_max: f64,
    /// Highest altitude with echo > 5 dBZ
    pub echo5_max: f64,
    /// Highest altitude with echo > 15 dBZ
    pub echo15_max: f64,
}

impl ColumnProfile {
    /// Summarize a column. Altitudes with no qualifying echo reduce to 0.
    pub fn from_column<I>(values: I, altitudes: &[f64]) -> Self
    where
        I: IntoIterator<Item = Option<GridValue>>,
    {
        let mut max_reflectivity: Option<GridValue> = None;
        let mut echo0_min: Option<f64> = None;
        let mut echo0_max: Option<f64> = None;
        let mut echo5_max: Option<f64> = None;
        let mut echo15_max: Option<f64> = None;

        let highest = |current: Option<f64>, alt: f64| Some(current.map_or(alt, |h| h.max(alt)));

        for (value, &alt) in values.into_iter().zip(altitudes) {
            let Some(z) = value else { continue };

            max_reflectivity = Some(max_reflectivity.map_or(z, |m| m.max(z)));
            if z > 0.0 {
                echo0_min = Some(echo0_min.map_or(alt, |l| l.min(alt)));
                echo0_max = highest(echo0_max, alt);
            }
            if z > 5.0 {
                echo5_max = highest(echo5_max, alt);
            }
            if z > 15.0 {
                echo15_max = highest(echo15_max, alt);
            }
        }

        Self {
            max_reflectivity,
            echo0_min: echo0_min.unwrap_or(0.0),
            echo0_max: echo0_max.unwrap_or(0.0),
            echo5_max: echo5_max.unwrap_or(0.0),
            echo15_max: echo15_max.unwrap_or(0.0),
        }
    }

    /// Weak and/or shallow echo typical of ground clutter and biological scatterers
    pub fn is_weak_or_shallow(&self) -> bool {
        let Some(max) = self.max_reflectivity else {
            return false;
        };

        (max < 20.0 && self.echo0_max <= 4.0 && self.echo0_min <= 3.0)
            || (max < 10.0 && self.echo0_max <= 5.0 && self.echo0_min <= 3.0)
            || (self.echo5_max <= 5.0 && self.echo5_max > 0.0 && self.echo15_max <= 3.0)
            || (self.echo15_max < 2.0 && self.echo15_max > 0.0)
    }
}

/// Clutter and speckle remover
pub struct ClutterRemover {
    params: DeclutterParams,
}

impl ClutterRemover {
    /// Create a remover with default parameters
    pub fn new() -> Self {
        Self {
            params: DeclutterParams::default(),
        }
    }

    /// Create a remover with custom parameters, rejecting invalid ones
    pub fn with_params(params: DeclutterParams) -> GridRadResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &DeclutterParams {
        &self.params
    }

    /// Passes in the order they run
    pub fn passes(&self) -> Vec<ClutterPass> {
        let mut passes = vec![ClutterPass::CorrelationScreen, ClutterPass::ArealSpeckle];
        if !self.params.skip_weak_low_level_echo {
            passes.push(ClutterPass::WeakEchoLevels);
            passes.push(ClutterPass::WeakEchoColumns);
        }
        passes.push(ClutterPass::AnvilClutter);
        passes.push(ClutterPass::ArealSpeckle);
        passes
    }

    /// Cells a single pass flags, given the clutter already in `mask`
    pub fn detect(&self, pass: ClutterPass, grid: &Grid, mask: &CellMask) -> GridRadResult<CellMask> {
        let stage = pass.to_string();
        let reflectivity = MaskedVolume::new(grid.reflectivity().values().view(), mask.view(), &stage)?;

        let detected = match pass {
            ClutterPass::CorrelationScreen => correlation_screen(grid, &reflectivity),
            ClutterPass::ArealSpeckle => areal_speckle(&reflectivity, &self.params),
            ClutterPass::WeakEchoLevels => weak_echo_levels(grid, &reflectivity),
            ClutterPass::WeakEchoColumns => weak_echo_columns(grid, &reflectivity),
            ClutterPass::AnvilClutter => anvil_clutter(grid, &reflectivity),
        };

        Ok(detected)
    }

    /// Run one pass and fold its detections into `mask`
    pub fn mark(&self, pass: ClutterPass, grid: &Grid, mask: CellMask) -> GridRadResult<CellMask> {
        self.mark_counted(pass, grid, mask).map(|(mask, _)| mask)
    }

    fn mark_counted(
        &self,
        pass: ClutterPass,
        grid: &Grid,
        mut mask: CellMask,
    ) -> GridRadResult<(CellMask, usize)> {
        let detected = self.detect(pass, grid, &mask)?;

        let mut added = 0usize;
        Zip::from(&mut mask).and(&detected).for_each(|marked, &hit| {
            if hit && !*marked {
                *marked = true;
                added += 1;
            }
        });

        log::debug!("Pass '{}' marked {} additional cells", pass, added);
        Ok((mask, added))
    }

    /// Accumulate the clutter mask over every pass without touching the grid
    pub fn clutter_mask(&self, grid: &Grid) -> GridRadResult<CellMask> {
        self.accumulate(grid).map(|(mask, _)| mask)
    }

    fn accumulate(&self, grid: &Grid) -> GridRadResult<(CellMask, Vec<(ClutterPass, usize)>)> {
        grid.check_shapes("clutter removal")?;

        let mut mask = CellMask::from_elem(grid.shape(), false);
        let mut marked_by_pass = Vec::new();

        for pass in self.passes() {
            let (updated, added) = self.mark_counted(pass, grid, mask)?;
            mask = updated;
            marked_by_pass.push((pass, added));
        }

        Ok((mask, marked_by_pass))
    }

    /// Remove clutter and speckles from every value field
    pub fn apply(&self, grid: Grid) -> GridRadResult<Grid> {
        self.apply_with_report(grid).map(|(grid, _)| grid)
    }

    pub fn apply_with_report(&self, mut grid: Grid) -> GridRadResult<(Grid, DeclutterReport)> {
        log::info!(
            "Removing clutter from {:?} grid (areal_coverage_thresh={}, skip_weak_ll_echo={})",
            grid.shape(),
            self.params.areal_coverage_threshold,
            self.params.skip_weak_low_level_echo
        );

        let (mask, marked_by_pass) = self.accumulate(&grid)?;
        let cells_nulled = grid.null_cells(&mask, "clutter removal")?;

        log::info!("Clutter removal nulled {} reflectivity observations", cells_nulled);
        Ok((
            grid,
            DeclutterReport {
                marked_by_pass,
                cells_nulled,
            },
        ))
    }
}

impl Default for ClutterRemover {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of each cell's horizontal neighborhood that holds valid echo.
///
/// Neighbors past the domain edge take the value of the nearest edge cell;
/// the domain never wraps around.
pub fn areal_coverage(valid: &CellMask, window: usize) -> Array3<f64> {
    let mut coverage = Array3::<f64>::zeros(valid.dim());
    fill_coverage(&mut coverage, valid, window / 2);
    coverage
}

fn coverage_at(valid: &CellMask, (k, j, i): (usize, usize, usize), half: usize) -> f64 {
    let (_, ny, nx) = valid.dim();
    let half = half as isize;
    let side = 2 * half + 1;
    let clamp = |index: isize, len: usize| index.clamp(0, len as isize - 1) as usize;

    let mut count = 0usize;
    for dj in -half..=half {
        let jj = clamp(j as isize + dj, ny);
        for di in -half..=half {
            let ii = clamp(i as isize + di, nx);
            if valid[[k, jj, ii]] {
                count += 1;
            }
        }
    }
    count as f64 / (side * side) as f64
}

#[cfg(feature = "parallel")]
fn fill_coverage(coverage: &mut Array3<f64>, valid: &CellMask, half: usize) {
    Zip::indexed(coverage).par_for_each(|cell, c| *c = coverage_at(valid, cell, half));
}

#[cfg(not(feature = "parallel"))]
fn fill_coverage(coverage: &mut Array3<f64>, valid: &CellMask, half: usize) {
    Zip::indexed(coverage).for_each(|cell, c| *c = coverage_at(valid, cell, half));
}

/// Evaluate `flag` for every (latitude, longitude) column
#[cfg(feature = "parallel")]
fn column_flags<F>(ny: usize, nx: usize, flag: F) -> Array2<bool>
where
    F: Fn(usize, usize) -> bool + Sync + Send,
{
    use rayon::prelude::*;

    let columns: Vec<(usize, usize)> = (0..ny).flat_map(|j| (0..nx).map(move |i| (j, i))).collect();
    let flags: Vec<(usize, usize, bool)> = columns
        .into_par_iter()
        .map(|(j, i)| (j, i, flag(j, i)))
        .collect();

    let mut out = Array2::from_elem((ny, nx), false);
    for (j, i, hit) in flags {
        out[[j, i]] = hit;
    }
    out
}

#[cfg(not(feature = "parallel"))]
fn column_flags<F>(ny: usize, nx: usize, flag: F) -> Array2<bool>
where
    F: Fn(usize, usize) -> bool + Sync + Send,
{
    Array2::from_shape_fn((ny, nx), |(j, i)| flag(j, i))
}

fn correlation_screen(grid: &Grid, reflectivity: &MaskedVolume) -> CellMask {
    let mut detected = CellMask::from_elem(grid.shape(), false);

    let dual_pol = match grid.dual_pol() {
        DualPolFamily::Present(fields) => fields,
        DualPolFamily::Absent => {
            log::debug!("No dual-polarization fields, correlation screen skipped");
            return detected;
        }
    };

    let altitude = grid.altitude().values();
    Zip::indexed(&mut detected)
        .and(dual_pol.correlation_coefficient.values())
        .for_each(|(k, j, i), hit, &rho_hv| {
            if rho_hv.is_nan() {
                return;
            }
            if let Some(z) = reflectivity.get([k, j, i]) {
                *hit = (z < 40.0 && rho_hv < 0.9)
                    || (z < 25.0 && rho_hv < 0.95 && altitude[k] >= UPPER_LEVEL_BASE_KM);
            }
        });

    detected
}

fn areal_speckle(reflectivity: &MaskedVolume, params: &DeclutterParams) -> CellMask {
    let coverage = areal_coverage(&reflectivity.valid_cells(), params.neighborhood_size);
    coverage.mapv(|fraction| fraction <= params.areal_coverage_threshold)
}

fn weak_echo_levels(grid: &Grid, reflectivity: &MaskedVolume) -> CellMask {
    let altitude = grid.altitude().values();
    let mut detected = CellMask::from_elem(grid.shape(), false);

    Zip::indexed(&mut detected).for_each(|(k, j, i), hit| {
        if altitude[k] <= LOW_LEVEL_TOP_KM {
            if let Some(z) = reflectivity.get([k, j, i]) {
                *hit = z < 10.0;
            }
        }
    });

    detected
}

fn weak_echo_columns(grid: &Grid, reflectivity: &MaskedVolume) -> CellMask {
    let (_, ny, nx) = grid.shape();
    let altitude = grid.altitude().values();

    let weak = column_flags(ny, nx, |j, i| {
        ColumnProfile::from_column(reflectivity.column(j, i), altitude).is_weak_or_shallow()
    });

    let mut detected = CellMask::from_elem(grid.shape(), false);
    Zip::indexed(&mut detected).for_each(|(_, j, i), hit| *hit = weak[[j, i]]);
    detected
}

fn anvil_clutter(grid: &Grid, reflectivity: &MaskedVolume) -> CellMask {
    let (nz, ny, nx) = grid.shape();
    let mut detected = CellMask::from_elem((nz, ny, nx), false);

    let Some(k_cutoff) = grid.altitude().index_at_or_above(ANVIL_CUTOFF_KM) else {
        log::warn!(
            "No altitude level at or above {} km, anvil clutter check skipped",
            ANVIL_CUTOFF_KM
        );
        return detected;
    };

    // The trapped layer includes k_cutoff itself.
    let trapped = column_flags(ny, nx, |j, i| {
        !reflectivity.is_valid([k_cutoff, j, i])
            && (k_cutoff + 1..nz).any(|k| reflectivity.is_valid([k, j, i]))
            && (0..k_cutoff).any(|k| reflectivity.is_valid([k, j, i]))
    });

    Zip::indexed(&mut detected).for_each(|(k, j, i), hit| {
        *hit = k <= k_cutoff && trapped[[j, i]];
    });

    detected
}
