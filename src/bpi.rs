//! Bathymetric Position Index.
//!
//! BPI compares each cell's depth with the mean depth of an annulus (a
//! "donut") around it, so positive values are crests and negative values are
//! depressions. Broad and fine scale BPI differ only in the annulus radii.
//!
//! Reference: Weiss, A. (2001). Topographic position and landforms analysis.
//! ESRI User Conference, San Diego, CA.

use tracing::debug;

use crate::algebra::{self, arc_round, round_to_int, statistics};
use crate::error::{Error, Result};
use crate::focal::focal_mean;
use crate::neighborhood::Neighborhood;
use crate::raster::{Raster, INT_NODATA};

/// Raw BPI: `round(bathy - annulus_mean)` as an integer raster.
///
/// # Parameters
///
/// - `bathy`: bathymetry, no-data cells are skipped by the annulus mean.
/// - `inner_radius`, `outer_radius`: annulus radii in cells, `0 < inner < outer`.
///
/// Cells whose annulus reaches past the raster edge are no-data.
///
/// # Example
///
/// ```
/// use ndarray::Array2;
/// use benthic_terrain::{bpi::bpi, Raster};
///
/// let bathy = Raster::from_array(Array2::from_elem((9, 9), -40.0));
/// let raw = bpi(&bathy, 1, 3).expect("valid radii");
/// assert_eq!(raw.get(4, 4), Some(0));
/// assert_eq!(raw.get(0, 0), None);
/// ```
pub fn bpi(bathy: &Raster<f64>, inner_radius: usize, outer_radius: usize) -> Result<Raster<i32>> {
    let nbhd = Neighborhood::annulus(inner_radius, outer_radius)?;
    debug!(inner_radius, outer_radius, cells = nbhd.cell_count(), "bpi annulus");
    let mean = focal_mean(bathy, &nbhd)?;
    let diff = algebra::subtract(bathy, &mean)?;
    Ok(round_to_int(&diff))
}

/// Standardised BPI: `round(100 * (bpi - mean) / std)` using the global mean
/// and population standard deviation of the data cells.
///
/// Fails with [`Error::DegenerateInput`] for a flat (zero deviation) or
/// empty input.
pub fn stdbpi(bpi_raster: &Raster<i32>) -> Result<Raster<i32>> {
    let stats = statistics(bpi_raster)
        .ok_or_else(|| Error::DegenerateInput("BPI raster has no data cells".to_string()))?;
    if stats.std == 0.0 || !stats.std.is_finite() {
        return Err(Error::DegenerateInput(format!(
            "BPI raster has zero standard deviation (every cell is {})",
            stats.mean
        )));
    }
    debug!(mean = stats.mean, std = stats.std, "standardising bpi");
    Ok(bpi_raster.map(INT_NODATA, |v| {
        let z = arc_round(100.0 * (v as f64 - stats.mean) / stats.std);
        z as i32
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn bump_is_positive_pit_is_negative() {
        let mut data = Array2::from_elem((7, 7), -20.0);
        data[[3, 3]] = -10.0;
        data[[3, 4]] = -31.0;
        let out = bpi(&Raster::from_array(data), 1, 2).unwrap();
        assert!(out.get(3, 3).unwrap() > 0);
        assert!(out.get(3, 4).unwrap() < 0);
    }

    #[test]
    fn bad_radii() {
        let r = Raster::from_array(Array2::zeros((5, 5)));
        assert!(matches!(bpi(&r, 3, 2), Err(Error::InvalidParameter { .. })));
        assert!(matches!(bpi(&r, 0, 2), Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn standardised_values() {
        // mean 0, population std 10
        let r = Raster::new(array![[-10, 10], [-10, 10]], INT_NODATA);
        let s = stdbpi(&r).unwrap();
        assert_eq!(s.data(), &array![[-100, 100], [-100, 100]]);
    }

    #[test]
    fn standardising_skips_nodata() {
        let r = Raster::new(array![[-10, 10, INT_NODATA]], INT_NODATA);
        let s = stdbpi(&r).unwrap();
        assert_eq!(s.data(), &array![[-100, 100, INT_NODATA]]);
    }

    #[test]
    fn flat_bpi_is_degenerate() {
        let r = Raster::new(array![[3, 3], [3, 3]], INT_NODATA);
        assert!(matches!(stdbpi(&r), Err(Error::DegenerateInput(_))));
        let empty = Raster::new(array![[INT_NODATA]], INT_NODATA);
        assert!(matches!(stdbpi(&empty), Err(Error::DegenerateInput(_))));
    }
}
