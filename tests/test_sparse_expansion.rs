mod common;

use gridrad::types::*;
use gridrad::SparseIndexExpander;
use ndarray::Array3;

#[test]
fn test_expansion_round_trip() {
    common::init_logging();

    let shape = (4, 5, 6);
    // Every third cell observed, in scrambled order
    let mut index: Vec<i64> = (0..120).step_by(3).collect();
    index.reverse();
    index.swap(0, 7);
    let values: Vec<f32> = index.iter().map(|&c| c as f32 * 0.5 - 10.0).collect();

    let expander = SparseIndexExpander::new(shape, &index).unwrap();
    let dense = expander.expand_values("Reflectivity", &values).unwrap();

    for (cell, value) in dense.iter().enumerate() {
        if cell % 3 == 0 {
            assert_eq!(*value, cell as f32 * 0.5 - 10.0);
        } else {
            assert!(value.is_nan(), "cell {} should be missing", cell);
        }
    }

    let gathered = expander.gather(&dense).unwrap();
    assert_eq!(gathered, values);
}

#[test]
fn test_archive_expansion_shares_index_across_variables() {
    let mut refl = Array3::from_elem((2, 3, 3), MISSING);
    refl[[0, 1, 1]] = 22.5;
    refl[[1, 2, 0]] = 31.0;
    let archive = common::archive_from_dense(&[1.0, 2.0], &refl, 3.0, true, true);
    assert!(archive.has_doppler());
    assert!(archive.has_dual_pol());

    let grid = archive.expand().unwrap();
    assert_eq!(grid.shape(), (2, 3, 3));

    for field in grid.value_fields() {
        assert_eq!(field.valid_count(), 2, "{}", field.name());
        assert!(!field.is_missing([0, 1, 1]));
        assert!(!field.is_missing([1, 2, 0]));
        assert_eq!(field.weights()[[0, 1, 1]], 3.0);
        assert_eq!(field.weights()[[0, 0, 0]], 0.0);
    }

    assert_eq!(grid.spectrum_width().values()[[1, 2, 0]], 31.0);
    assert_eq!(grid.metadata().analysis_time, "2011-04-26T22:00:00Z");
}

#[test]
fn test_gather_rejects_wrong_shape() {
    let expander = SparseIndexExpander::new((1, 2, 2), &[0, 3]).unwrap();
    let dense = Array3::<f32>::zeros((1, 2, 3));
    assert!(matches!(expander.gather(&dense), Err(GridRadError::ShapeMismatch { .. })));
}

#[test]
fn test_empty_index_expands_to_all_missing() {
    let refl = Array3::from_elem((2, 2, 2), MISSING);
    let grid = common::archive_from_dense(&[1.0, 2.0], &refl, 1.0, false, false)
        .expand()
        .unwrap();
    assert_eq!(grid.reflectivity().valid_count(), 0);
    assert!(grid.column_max_reflectivity().iter().all(|v| v.is_nan()));
}
