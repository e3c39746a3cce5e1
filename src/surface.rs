//! Slope and aspect from a bathymetry grid (Horn, 1981).
//!
//! 3x3 layout around the processing cell:
//! ```text
//!   a b c
//!   d e f
//!   g h i
//! ```
//! `dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * resx)`
//! `dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * resy)`
//!
//! Border cells, and cells with a no-data neighbour, are no-data.

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::raster::Raster;

/// Aspect value written for flat cells.
pub const FLAT_ASPECT: f64 = -1.0;

fn horn_gradient(
    dem: &Raster<f64>,
    row: usize,
    col: usize,
    resx: f64,
    resy: f64,
) -> Option<(f64, f64)> {
    let z = |dr: usize, dc: usize| dem.get(row + dr - 1, col + dc - 1);
    let (a, b, c) = (z(0, 0)?, z(0, 1)?, z(0, 2)?);
    let (d, f) = (z(1, 0)?, z(1, 2)?);
    let (g, h, i) = (z(2, 0)?, z(2, 1)?, z(2, 2)?);
    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * resx);
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * resy);
    Some((dz_dx, dz_dy))
}

fn per_cell<F>(dem: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64, f64) -> f64 + Sync + Send,
{
    let (rows, cols) = dem.shape();
    let (resx, resy) = dem.cell_size();
    if resx <= 0.0 || resy <= 0.0 {
        return Err(Error::invalid("cell_size", format!("{resx}x{resy}"), "must be positive"));
    }
    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            let mut row_data = vec![f64::NAN; cols];
            if row == 0 || row + 1 >= rows {
                return row_data;
            }
            for col in 1..cols.saturating_sub(1) {
                if let Some((dz_dx, dz_dy)) = horn_gradient(dem, row, col, resx, resy) {
                    row_data[col] = f(dz_dx, dz_dy);
                }
            }
            row_data
        })
        .collect();
    let data = Array2::from_shape_vec((rows, cols), output)
        .map_err(|e| Error::EngineFailure(e.to_string()))?;
    Ok(Raster::from_array(data).with_geo(dem.geo().clone()))
}

/// Slope in degrees. `z_factor` converts z units to ground units.
pub fn slope(dem: &Raster<f64>, z_factor: f64) -> Result<Raster<f64>> {
    per_cell(dem, |dz_dx, dz_dy| {
        (z_factor * (dz_dx * dz_dx + dz_dy * dz_dy).sqrt()).atan().to_degrees()
    })
}

/// Aspect in degrees clockwise from north, [`FLAT_ASPECT`] where the
/// surface has no gradient.
pub fn aspect(dem: &Raster<f64>) -> Result<Raster<f64>> {
    per_cell(dem, aspect_from_gradient)
}

/// Compass aspect of a gradient. Returns [`FLAT_ASPECT`] for a zero gradient.
pub fn aspect_from_gradient(dz_dx: f64, dz_dy: f64) -> f64 {
    if dz_dx == 0.0 && dz_dy == 0.0 {
        return FLAT_ASPECT;
    }
    let raw = dz_dy.atan2(-dz_dx).to_degrees();
    if raw < 0.0 {
        90.0 - raw
    } else if raw > 90.0 {
        360.0 - raw + 90.0
    } else {
        90.0 - raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoInfo;
    use approx::assert_relative_eq;

    fn ramp(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        Raster::from_array(Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)))
            .with_geo(GeoInfo::with_cell_size(10.0, 10.0))
    }

    #[test]
    fn flat_surface() {
        let dem = ramp(5, 5, |_, _| -50.0);
        let s = slope(&dem, 1.0).unwrap();
        let a = aspect(&dem).unwrap();
        assert_eq!(s.data()[[2, 2]], 0.0);
        assert_eq!(a.data()[[2, 2]], FLAT_ASPECT);
        assert!(s.data()[[0, 2]].is_nan());
    }

    #[test]
    fn east_facing_45_degrees() {
        // drops 10 m per 10 m cell towards the east
        let dem = ramp(5, 5, |_, c| -10.0 * c as f64);
        let s = slope(&dem, 1.0).unwrap();
        let a = aspect(&dem).unwrap();
        assert_relative_eq!(s.data()[[2, 2]], 45.0, epsilon = 1e-9);
        assert_relative_eq!(a.data()[[2, 2]], 90.0, epsilon = 1e-9);
    }

    #[test]
    fn compass_directions() {
        // deeper towards the top row -> faces north
        let north = ramp(5, 5, |r, _| r as f64);
        assert_relative_eq!(aspect(&north).unwrap().data()[[2, 2]], 0.0, epsilon = 1e-9);
        let south = ramp(5, 5, |r, _| -(r as f64));
        assert_relative_eq!(aspect(&south).unwrap().data()[[2, 2]], 180.0, epsilon = 1e-9);
        let west = ramp(5, 5, |_, c| c as f64);
        assert_relative_eq!(aspect(&west).unwrap().data()[[2, 2]], 270.0, epsilon = 1e-9);
    }

    #[test]
    fn nodata_neighbour() {
        let mut data = Array2::from_elem((3, 3), 1.0);
        data[[0, 0]] = f64::NAN;
        let dem = Raster::from_array(data);
        assert!(slope(&dem, 1.0).unwrap().data()[[1, 1]].is_nan());
    }
}
