//! Boundary with the archive (file format) collaborator

use crate::io::sparse::SparseArchive;
use crate::types::{GridRadError, GridRadResult};
use std::path::Path;

/// Anything that can turn a file path into raw sparse archive content
pub trait ArchiveSource {
    fn read_archive(&self, path: &Path) -> GridRadResult<SparseArchive>;
}

/// Ensure the input exists and is not empty before any parsing starts
pub fn check_input_file(path: &Path) -> GridRadResult<()> {
    if !path.is_file() {
        return Err(GridRadError::InputNotFound(path.to_path_buf()));
    }

    let size = std::fs::metadata(path)?.len();
    if size == 0 {
        return Err(GridRadError::MalformedInput(format!(
            "{} contains no data",
            path.display()
        )));
    }

    log::debug!("Input {} ({} bytes)", path.display(), size);
    Ok(())
}

/// Split a (sweep, character) array into one name per sweep.
///
/// Trailing NUL padding and whitespace are dropped, empty rows are skipped.
pub fn sweep_names(chars: &[u8], row_len: usize) -> Vec<String> {
    if row_len == 0 {
        return Vec::new();
    }

    chars
        .chunks(row_len)
        .map(|row| {
            String::from_utf8_lossy(row)
                .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(feature = "netcdf")]
pub use self::netcdf_source::NetCdfArchive;

#[cfg(feature = "netcdf")]
mod netcdf_source {
    use super::{check_input_file, sweep_names, ArchiveSource};
    use crate::io::sparse::{SparseArchive, SparseVariable};
    use crate::types::*;
    use netcdf::AttributeValue;
    use std::collections::BTreeMap;
    use std::path::Path;

    /// Reader for GridRad v4 NetCDF files
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NetCdfArchive;

    fn archive_error(context: &str, e: impl std::fmt::Display) -> GridRadError {
        GridRadError::Archive(format!("{}: {}", context, e))
    }

    fn as_text(value: AttributeValue) -> Option<String> {
        match value {
            AttributeValue::Str(s) => Some(s),
            AttributeValue::Strs(v) => Some(v.join(" ")),
            AttributeValue::Float(f) => Some(f.to_string()),
            AttributeValue::Double(d) => Some(d.to_string()),
            AttributeValue::Int(i) => Some(i.to_string()),
            AttributeValue::Short(s) => Some(s.to_string()),
            _ => None,
        }
    }

    fn as_number(value: AttributeValue) -> Option<f64> {
        match value {
            AttributeValue::Float(f) => Some(f as f64),
            AttributeValue::Double(d) => Some(d),
            AttributeValue::Int(i) => Some(i as f64),
            AttributeValue::Short(s) => Some(s as f64),
            AttributeValue::Floats(v) => v.first().map(|&f| f as f64),
            AttributeValue::Doubles(v) => v.first().copied(),
            AttributeValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn global_text(file: &netcdf::File, name: &str) -> GridRadResult<String> {
        let attribute = file
            .attribute(name)
            .ok_or_else(|| GridRadError::Metadata(format!("missing global attribute {}", name)))?;
        let value = attribute.value().map_err(|e| archive_error(name, e))?;
        as_text(value).ok_or_else(|| GridRadError::Metadata(format!("global attribute {} is not text", name)))
    }

    fn variable_text(variable: &netcdf::Variable, name: &str) -> String {
        variable
            .attribute(name)
            .and_then(|a| a.value().ok())
            .and_then(as_text)
            .unwrap_or_default()
    }

    fn read_axis(file: &netcdf::File, kind: AxisKind) -> GridRadResult<Axis> {
        let name = kind.to_string();
        let variable = file
            .variable(&name)
            .ok_or_else(|| GridRadError::MalformedInput(format!("missing axis variable {}", name)))?;
        let values = variable
            .get_values::<f64, _>(..)
            .map_err(|e| archive_error(&name, e))?;
        let delta = variable
            .attribute("delta")
            .and_then(|a| a.value().ok())
            .and_then(as_number)
            .unwrap_or(f64::NAN);

        Axis::new(
            kind,
            values,
            delta,
            variable_text(&variable, "units"),
            variable_text(&variable, "long_name"),
        )
    }

    fn read_variable(file: &netcdf::File, name: &str) -> GridRadResult<Option<SparseVariable>> {
        let Some(values_var) = file.variable(name) else {
            return Ok(None);
        };
        let weight_name = weight_variable_name(name);
        let weights_var = file
            .variable(&weight_name)
            .ok_or_else(|| GridRadError::MalformedInput(format!("{} has no {} variable", name, weight_name)))?;

        let values = values_var
            .get_values::<f32, _>(..)
            .map_err(|e| archive_error(name, e))?;
        let weights = weights_var
            .get_values::<f32, _>(..)
            .map_err(|e| archive_error(&weight_name, e))?;

        let weight_missing = weights_var
            .attribute("missing_value")
            .and_then(|a| a.value().ok())
            .and_then(as_number)
            .map(|v| v as GridValue)
            .unwrap_or(MISSING);

        Ok(Some(SparseVariable {
            meta: VariableMeta {
                name: name.to_string(),
                long_name: variable_text(&values_var, "long_name"),
                units: variable_text(&values_var, "units"),
                weight_long_name: variable_text(&weights_var, "long_name"),
                weight_units: variable_text(&weights_var, "units"),
                weight_missing,
            },
            values,
            weights,
        }))
    }

    fn read_sweeps(file: &netcdf::File) -> GridRadResult<Vec<String>> {
        let Some(variable) = file.variable("sweeps_merged") else {
            log::debug!("No sweeps_merged variable, merged sweep list left empty");
            return Ok(Vec::new());
        };

        let row_len = variable.dimensions().last().map_or(0, |d| d.len());
        let chars = variable
            .get_raw_values(..)
            .map_err(|e| archive_error("sweeps_merged", e))?;
        let sweeps = sweep_names(&chars, row_len);
        log::debug!("{} sweeps merged into the analysis", sweeps.len());
        Ok(sweeps)
    }

    fn read_counts(file: &netcdf::File, name: &str) -> GridRadResult<Vec<u32>> {
        file.variable(name)
            .ok_or_else(|| GridRadError::MalformedInput(format!("missing variable {}", name)))?
            .get_values::<u32, _>(..)
            .map_err(|e| archive_error(name, e))
    }

    impl ArchiveSource for NetCdfArchive {
        fn read_archive(&self, path: &Path) -> GridRadResult<SparseArchive> {
            check_input_file(path)?;
            log::info!("Reading GridRad archive {}", path.display());

            let file = netcdf::open(path).map_err(|e| archive_error(&path.display().to_string(), e))?;

            let metadata = GridMetadata {
                analysis_time: global_text(&file, "Analysis_time")?,
                analysis_time_window: global_text(&file, "Analysis_time_window")?,
                file_creation_date: global_text(&file, "File_creation_date")?,
                grid_scheme: global_text(&file, "Grid_scheme")?,
                algorithm_version: global_text(&file, "Algorithm_version")?,
                algorithm_description: global_text(&file, "Algorithm_description")?,
                authors: global_text(&file, "Authors")?,
                project_sponsor: global_text(&file, "Project_sponsor")?,
                project_name: global_text(&file, "Project_name")?,
                sweeps_merged: read_sweeps(&file)?,
                source: Some(path.to_path_buf()),
            };

            let index = file
                .variable("index")
                .ok_or_else(|| GridRadError::MalformedInput("missing variable index".to_string()))?
                .get_values::<i64, _>(..)
                .map_err(|e| archive_error("index", e))?;

            let mut variables = BTreeMap::new();
            for name in VALUE_VARIABLES {
                if let Some(variable) = read_variable(&file, name)? {
                    variables.insert(name.to_string(), variable);
                }
            }

            Ok(SparseArchive {
                longitude: read_axis(&file, AxisKind::Longitude)?,
                latitude: read_axis(&file, AxisKind::Latitude)?,
                altitude: read_axis(&file, AxisKind::Altitude)?,
                index,
                variables,
                observation_count: read_counts(&file, OBSERVATION_COUNT)?,
                echo_count: read_counts(&file, ECHO_COUNT)?,
                metadata,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nexrad_3d_v4_2_20110426T220000Z.nc");
        assert!(matches!(check_input_file(&path), Err(GridRadError::InputNotFound(_))));
    }

    #[test]
    fn test_empty_input_is_malformed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(check_input_file(file.path()), Err(GridRadError::MalformedInput(_))));
    }

    #[test]
    fn test_sweep_names_split_rows() {
        let mut chars = Vec::new();
        chars.extend_from_slice(b"KTLX_20110426T215930Z\0\0\0");
        chars.extend_from_slice(b"KINX_20110426T220112Z   ");
        chars.extend_from_slice(&[0u8; 24]);

        let sweeps = sweep_names(&chars, 24);
        assert_eq!(sweeps, vec!["KTLX_20110426T215930Z", "KINX_20110426T220112Z"]);
        assert!(sweep_names(&chars, 0).is_empty());
    }

    #[test]
    fn test_non_empty_input_passes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"CDF\x01").unwrap();
        assert!(check_input_file(file.path()).is_ok());
    }
}
