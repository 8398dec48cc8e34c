//! The volumetric container every pipeline stage operates on

use crate::types::*;
use ndarray::{Axis as ArrayAxis, Zip};

/// Components needed to assemble a [`Grid`]
#[derive(Debug, Clone)]
pub struct GridParts {
    pub longitude: Axis,
    pub latitude: Axis,
    pub altitude: Axis,
    pub reflectivity: Field,
    pub spectrum_width: Field,
    pub doppler: DopplerFamily,
    pub dual_pol: DualPolFamily,
    pub observation_count: CountVolume,
    pub echo_count: CountVolume,
    pub metadata: GridMetadata,
}

/// Dense GridRad volume: axes, value fields, observation counts and metadata.
///
/// Shape is fixed at construction. Stages can only set value cells to missing,
/// and always across every field at once (see [`Grid::null_cells`]).
#[derive(Debug, Clone)]
pub struct Grid {
    longitude: Axis,
    latitude: Axis,
    altitude: Axis,
    reflectivity: Field,
    spectrum_width: Field,
    doppler: DopplerFamily,
    dual_pol: DualPolFamily,
    observation_count: CountVolume,
    echo_count: CountVolume,
    metadata: GridMetadata,
}

impl Grid {
    /// Assemble a grid, checking every array against the shape implied by the axes
    pub fn from_parts(parts: GridParts) -> GridRadResult<Self> {
        let grid = Self {
            longitude: parts.longitude,
            latitude: parts.latitude,
            altitude: parts.altitude,
            reflectivity: parts.reflectivity,
            spectrum_width: parts.spectrum_width,
            doppler: parts.doppler,
            dual_pol: parts.dual_pol,
            observation_count: parts.observation_count,
            echo_count: parts.echo_count,
            metadata: parts.metadata,
        };

        grid.check_shapes("grid construction")?;
        Ok(grid)
    }

    /// (n_altitude, n_latitude, n_longitude)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.altitude.len(), self.latitude.len(), self.longitude.len())
    }

    pub fn cell_count(&self) -> usize {
        let (nz, ny, nx) = self.shape();
        nz * ny * nx
    }

    pub fn longitude(&self) -> &Axis {
        &self.longitude
    }

    pub fn latitude(&self) -> &Axis {
        &self.latitude
    }

    pub fn altitude(&self) -> &Axis {
        &self.altitude
    }

    pub fn reflectivity(&self) -> &Field {
        &self.reflectivity
    }

    pub fn spectrum_width(&self) -> &Field {
        &self.spectrum_width
    }

    pub fn doppler(&self) -> &DopplerFamily {
        &self.doppler
    }

    pub fn dual_pol(&self) -> &DualPolFamily {
        &self.dual_pol
    }

    pub fn observation_count(&self) -> &CountVolume {
        &self.observation_count
    }

    pub fn echo_count(&self) -> &CountVolume {
        &self.echo_count
    }

    pub fn metadata(&self) -> &GridMetadata {
        &self.metadata
    }

    pub fn has_doppler(&self) -> bool {
        self.doppler.is_present()
    }

    pub fn has_dual_pol(&self) -> bool {
        self.dual_pol.is_present()
    }

    /// Every value field currently present, reflectivity first
    pub fn value_fields(&self) -> Vec<&Field> {
        let mut fields = vec![&self.reflectivity, &self.spectrum_width];

        match &self.doppler {
            DopplerFamily::Present(d) => {
                fields.push(&d.azimuthal_shear);
                fields.push(&d.divergence);
            }
            DopplerFamily::Absent => {}
        }

        match &self.dual_pol {
            DualPolFamily::Present(p) => {
                fields.push(&p.differential_reflectivity);
                fields.push(&p.differential_phase);
                fields.push(&p.correlation_coefficient);
            }
            DualPolFamily::Absent => {}
        }

        fields
    }

    fn value_fields_mut(&mut self) -> Vec<&mut Field> {
        let mut fields = vec![&mut self.reflectivity, &mut self.spectrum_width];

        match &mut self.doppler {
            DopplerFamily::Present(d) => {
                fields.push(&mut d.azimuthal_shear);
                fields.push(&mut d.divergence);
            }
            DopplerFamily::Absent => {}
        }

        match &mut self.dual_pol {
            DualPolFamily::Present(p) => {
                fields.push(&mut p.differential_reflectivity);
                fields.push(&mut p.differential_phase);
                fields.push(&mut p.correlation_coefficient);
            }
            DualPolFamily::Absent => {}
        }

        fields
    }

    /// Verify every field and count array matches the axis shape
    pub fn check_shapes(&self, stage: &str) -> GridRadResult<()> {
        let expected = self.shape();

        let mismatch = |field: &str, found: (usize, usize, usize)| GridRadError::ShapeMismatch {
            stage: stage.to_string(),
            field: field.to_string(),
            expected,
            found,
        };

        for field in self.value_fields() {
            if field.dim() != expected {
                return Err(mismatch(field.name(), field.dim()));
            }
        }

        if self.observation_count.dim() != expected {
            return Err(mismatch(OBSERVATION_COUNT, self.observation_count.dim()));
        }
        if self.echo_count.dim() != expected {
            return Err(mismatch(ECHO_COUNT, self.echo_count.dim()));
        }

        Ok(())
    }

    /// Null every marked cell in all value fields at once.
    ///
    /// Returns the number of reflectivity cells that were valid before and are
    /// missing now. The mask shape is checked before any field is touched.
    pub(crate) fn null_cells(&mut self, mask: &CellMask, stage: &str) -> GridRadResult<usize> {
        let expected = self.shape();
        if mask.dim() != expected {
            return Err(GridRadError::ShapeMismatch {
                stage: stage.to_string(),
                field: "clutter mask".to_string(),
                expected,
                found: mask.dim(),
            });
        }

        let mut newly_nulled = 0usize;
        Zip::from(self.reflectivity.values())
            .and(mask)
            .for_each(|value, &marked| {
                if marked && !value.is_nan() {
                    newly_nulled += 1;
                }
            });

        for field in self.value_fields_mut() {
            field.null_where(mask);
        }

        Ok(newly_nulled)
    }

    /// Fraction of scans with echo per cell; 0 where there were no observations
    pub fn echo_frequency(&self) -> Volume {
        let mut frequency = Volume::zeros(self.shape());
        Zip::from(&mut frequency)
            .and(&self.echo_count)
            .and(&self.observation_count)
            .for_each(|freq, &necho, &nobs| {
                if nobs > 0 {
                    *freq = necho as GridValue / nobs as GridValue;
                }
            });
        frequency
    }

    /// Column-maximum reflectivity (NaN where a column has no valid cell)
    pub fn column_max_reflectivity(&self) -> ColumnImage {
        self.reflectivity
            .values()
            .fold_axis(ArrayAxis(0), MISSING, |&acc, &value| {
                if value.is_nan() {
                    acc
                } else if acc.is_nan() || value > acc {
                    value
                } else {
                    acc
                }
            })
    }
}
