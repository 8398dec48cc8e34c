//! Column-maximum reflectivity colouring for display.
//!
//! Only the in-memory raster is produced here; writing image files belongs to
//! whatever consumes it.

use crate::grid::Grid;
use crate::types::{ColumnImage, GridValue};
use ndarray::Array3;

/// Width of one colour level (dBZ)
pub const LEVEL_WIDTH_DBZ: GridValue = 5.0;

/// Displayed reflectivity range (dBZ)
pub const DISPLAY_RANGE_DBZ: (GridValue, GridValue) = (0.0, 75.0);

/// Colour for columns with no valid echo
pub const BACKGROUND_RGB: [u8; 3] = [200, 200, 200];

/// 15-level reflectivity ramp, one entry per 5 dBZ starting at 0 dBZ
pub const REFLECTIVITY_RAMP: [[u8; 3]; 15] = [
    [49, 239, 237],
    [30, 141, 192],
    [15, 56, 151],
    [150, 220, 150],
    [78, 186, 25],
    [15, 97, 3],
    [255, 222, 0],
    [217, 164, 0],
    [255, 107, 0],
    [198, 59, 0],
    [255, 0, 0],
    [109, 0, 0],
    [255, 0, 255],
    [255, 171, 255],
    [255, 255, 255],
];

/// Ramp level for a reflectivity value, `None` for missing values
pub fn color_level(dbz: GridValue) -> Option<usize> {
    if dbz.is_nan() {
        return None;
    }

    let last = REFLECTIVITY_RAMP.len() - 1;
    let level = (dbz / LEVEL_WIDTH_DBZ).trunc();
    Some(if level <= 0.0 {
        0
    } else {
        (level as usize).min(last)
    })
}

/// RGB colour for a reflectivity value
pub fn color_for(dbz: GridValue) -> [u8; 3] {
    color_level(dbz).map_or(BACKGROUND_RGB, |level| REFLECTIVITY_RAMP[level])
}

/// Colour a column-maximum image; output is (latitude, longitude, rgb)
pub fn colorize(column_max: &ColumnImage) -> Array3<u8> {
    let (ny, nx) = column_max.dim();
    let mut raster = Array3::<u8>::zeros((ny, nx, 3));

    for ((j, i), &dbz) in column_max.indexed_iter() {
        let rgb = color_for(dbz);
        for (c, &channel) in rgb.iter().enumerate() {
            raster[[j, i, c]] = channel;
        }
    }

    raster
}

/// Column-maximum reflectivity raster for a processed grid
pub fn render_column_max(grid: &Grid) -> Array3<u8> {
    let column_max = grid.column_max_reflectivity();
    log::debug!(
        "Rendering {:?} column-maximum image, {} columns with echo",
        column_max.dim(),
        column_max.iter().filter(|v| !v.is_nan()).count()
    );
    colorize(&column_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_color_levels_bin_at_five_dbz() {
        assert_eq!(color_level(GridValue::NAN), None);
        assert_eq!(color_level(-12.0), Some(0));
        assert_eq!(color_level(4.9), Some(0));
        assert_eq!(color_level(5.0), Some(1));
        assert_eq!(color_level(47.0), Some(9));
        assert_eq!(color_level(74.9), Some(14));
        assert_eq!(color_level(90.0), Some(14));
    }

    #[test]
    fn test_colorize_uses_background_for_missing() {
        let image = array![[GridValue::NAN, 52.0]];
        let raster = colorize(&image);
        assert_eq!(raster.dim(), (1, 2, 3));
        assert_eq!(raster[[0, 0, 0]], 200);
        assert_eq!(raster[[0, 1, 0]], 255);
        assert_eq!(raster[[0, 1, 1]], 0);
        assert_eq!(raster[[0, 1, 2]], 0);
    }
}
