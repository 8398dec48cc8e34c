use crate::types::{CellMask, GridRadError, GridRadResult, GridValue};
use ndarray::{ArrayView3, Zip};

/// Read-only view of a value volume with an exclusion mask.
///
/// A cell is valid only when its value is not NaN and it is not excluded, so
/// reductions over the view never see missing or already-flagged cells.
#[derive(Debug, Clone, Copy)]
pub struct MaskedVolume<'a> {
    values: ArrayView3<'a, GridValue>,
    excluded: ArrayView3<'a, bool>,
}

impl<'a> MaskedVolume<'a> {
    pub fn new(
        values: ArrayView3<'a, GridValue>,
        excluded: ArrayView3<'a, bool>,
        stage: &str,
    ) -> GridRadResult<Self> {
        if values.dim() != excluded.dim() {
            return Err(GridRadError::ShapeMismatch {
                stage: stage.to_string(),
                field: "exclusion mask".to_string(),
                expected: values.dim(),
                found: excluded.dim(),
            });
        }

        Ok(Self { values, excluded })
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.values.dim()
    }

    /// Value at `[k, j, i]`, or `None` when missing or excluded
    #[inline]
    pub fn get(&self, cell: [usize; 3]) -> Option<GridValue> {
        let value = self.values[cell];
        if value.is_nan() || self.excluded[cell] {
            None
        } else {
            Some(value)
        }
    }

    #[inline]
    pub fn is_valid(&self, cell: [usize; 3]) -> bool {
        self.get(cell).is_some()
    }

    /// Mask of valid cells
    pub fn valid_cells(&self) -> CellMask {
        let mut valid = CellMask::from_elem(self.dim(), false);
        Zip::from(&mut valid)
            .and(&self.values)
            .and(&self.excluded)
            .for_each(|v, &value, &excluded| *v = !value.is_nan() && !excluded);
        valid
    }

    /// Values of one vertical column, bottom to top
    pub fn column(&self, j: usize, i: usize) -> impl Iterator<Item = Option<GridValue>> + 'a {
        let this = *self;
        let nz = this.dim().0;
        (0..nz).map(move |k| this.get([k, j, i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Volume;

    #[test]
    fn test_masked_get_excludes_nan_and_marked() {
        let mut values = Volume::from_elem((2, 1, 2), 10.0);
        values[[0, 0, 1]] = GridValue::NAN;
        let mut excluded = CellMask::from_elem((2, 1, 2), false);
        excluded[[1, 0, 0]] = true;

        let view = MaskedVolume::new(values.view(), excluded.view(), "test").unwrap();
        assert_eq!(view.get([0, 0, 0]), Some(10.0));
        assert_eq!(view.get([0, 0, 1]), None);
        assert_eq!(view.get([1, 0, 0]), None);
        assert_eq!(view.column(0, 0).collect::<Vec<_>>(), vec![Some(10.0), None]);

        let valid = view.valid_cells();
        assert_eq!(valid.iter().filter(|&&v| v).count(), 2);
    }

    #[test]
    fn test_column_outlives_view() {
        let mut values = Volume::from_elem((3, 1, 2), 20.0);
        values[[1, 0, 1]] = GridValue::NAN;
        let excluded = CellMask::from_elem((3, 1, 2), false);

        // The iterator borrows the arrays, not the view it came from
        let column = {
            let view = MaskedVolume::new(values.view(), excluded.view(), "test").unwrap();
            view.column(0, 1)
        };
        assert_eq!(column.collect::<Vec<_>>(), vec![Some(20.0), None, Some(20.0)]);
    }

    #[test]
    fn test_masked_rejects_shape_mismatch() {
        let values = Volume::zeros((2, 2, 2));
        let excluded = CellMask::from_elem((2, 2, 1), false);
        assert!(MaskedVolume::new(values.view(), excluded.view(), "test").is_err());
    }
}
