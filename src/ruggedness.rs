//! Vector Ruggedness Measure (VRM)
//!
//! Ruggedness as the dispersion of unit surface normals in a square window:
//!
//! ```text
//! VRM = 1 - |R| / n²
//! ```
//!
//! where `R` is the sum of the normals in the `n x n` window. The raw x, y
//! and z components are summed before the length is taken; a steep but
//! uniform slope therefore scores 0, the same as a flat seafloor.
//!
//! Reference:
//! Sappington, J.M., Longshore, K.M. & Thompson, D.B. (2007).
//! Quantifying landscape ruggedness for animal habitat analysis.
//! Journal of Wildlife Management, 71(5), 1419–1426.

use tracing::debug;

use crate::error::{Error, Result};
use crate::algebra;
use crate::focal::{focal_statistics, FocalOptions, FocalStatistic, NoDataPolicy};
use crate::neighborhood::Neighborhood;
use crate::raster::Raster;
use crate::surface::{self, FLAT_ASPECT};

/// Per-cell unit normal components.
#[derive(Debug, Clone)]
pub struct NormalComponents {
    pub x: Raster<f64>,
    pub y: Raster<f64>,
    pub z: Raster<f64>,
}

/// Unit normal of every cell from slope and aspect in degrees.
///
/// ```text
/// z = cos(slope)
/// x = sin(slope) * sin(aspect)
/// y = sin(slope) * cos(aspect)
/// ```
///
/// Cells with aspect [`FLAT_ASPECT`] get `x = y = 0`; their `z` is kept.
pub fn normal_components(
    slope_deg: &Raster<f64>,
    aspect_deg: &Raster<f64>,
) -> Result<NormalComponents> {
    // a flat cell has no horizontal component whatever its slope value
    let tilted = slope_deg.zip_map(aspect_deg, f64::NAN, |s, a| {
        if a == FLAT_ASPECT { 0.0 } else { s }
    })?;
    let sin_slope = algebra::sin(&algebra::to_radians(&tilted));
    let aspect_rad = algebra::to_radians(aspect_deg);

    let x = algebra::multiply(&sin_slope, &algebra::sin(&aspect_rad))?;
    let y = algebra::multiply(&sin_slope, &algebra::cos(&aspect_rad))?;
    let z = algebra::cos(&algebra::to_radians(slope_deg));
    Ok(NormalComponents { x, y, z })
}

/// Check that a VRM window is an odd side length of at least 3.
pub fn validate_window(neighborhood_size: usize) -> Result<()> {
    if neighborhood_size < 3 || neighborhood_size % 2 == 0 {
        return Err(Error::invalid(
            "neighborhood_size",
            neighborhood_size,
            "must be an odd number of cells, 3 or more",
        ));
    }
    Ok(())
}

/// Vector ruggedness over a `neighborhood_size` square window.
///
/// # Parameters
///
/// - `slope_deg`: slope in degrees.
/// - `aspect_deg`: aspect in degrees, `-1` for flat cells.
/// - `neighborhood_size`: odd window side in cells, `>= 3`.
///
/// Output is in `[0, 1]`. A window that reaches past the raster edge or holds
/// any no-data cell gives no-data.
///
/// # Example
///
/// ```
/// use ndarray::Array2;
/// use benthic_terrain::{ruggedness::vrm, Raster};
///
/// let slope = Raster::from_array(Array2::from_elem((5, 5), 0.0));
/// let aspect = Raster::from_array(Array2::from_elem((5, 5), -1.0));
/// let rug = vrm(&slope, &aspect, 3).expect("odd window");
/// assert_eq!(rug.get(2, 2), Some(0.0));
/// ```
pub fn vrm(
    slope_deg: &Raster<f64>,
    aspect_deg: &Raster<f64>,
    neighborhood_size: usize,
) -> Result<Raster<f64>> {
    validate_window(neighborhood_size)?;
    let hood = Neighborhood::square(neighborhood_size)?;
    debug!(neighborhood_size, "vector ruggedness");

    let normals = normal_components(slope_deg, aspect_deg)?;
    let opts = FocalOptions {
        nodata: NoDataPolicy::Propagate,
        ..FocalOptions::new(FocalStatistic::Sum)
    };
    let sum_x = focal_statistics(&normals.x, &hood, opts)?;
    let sum_y = focal_statistics(&normals.y, &hood, opts)?;
    let sum_z = focal_statistics(&normals.z, &hood, opts)?;

    let squares = algebra::add(&algebra::power(&sum_x, 2.0), &algebra::power(&sum_y, 2.0))?;
    let resultant = algebra::sqrt(&algebra::add(&squares, &algebra::power(&sum_z, 2.0))?);

    let n2 = (neighborhood_size * neighborhood_size) as f64;
    Ok(resultant.map(f64::NAN, |r| (1.0 - r / n2).clamp(0.0, 1.0)))
}

/// [`vrm`] straight from bathymetry, with slope and aspect from
/// [`surface::slope`] and [`surface::aspect`].
pub fn vrm_from_bathymetry(bathy: &Raster<f64>, neighborhood_size: usize) -> Result<Raster<f64>> {
    validate_window(neighborhood_size)?;
    let slope = surface::slope(bathy, 1.0)?;
    let aspect = surface::aspect(bathy)?;
    vrm(&slope, &aspect, neighborhood_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn constant(rows: usize, cols: usize, v: f64) -> Raster<f64> {
        Raster::from_array(Array2::from_elem((rows, cols), v))
    }

    #[test]
    fn planar_neighbourhood_is_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let slope = constant(9, 9, 0.0);
        let aspect =
            Raster::from_array(Array2::from_shape_fn((9, 9), |_| rng.gen_range(0.0..360.0)));
        let rug = vrm(&slope, &aspect, 3).unwrap();
        for row in 1..8 {
            for col in 1..8 {
                assert_eq!(rug.get(row, col), Some(0.0));
            }
        }
        assert_eq!(rug.get(0, 4), None);
    }

    #[test]
    fn uniform_steep_slope_is_smooth() {
        let rug = vrm(&constant(7, 7, 45.0), &constant(7, 7, 90.0), 5).unwrap();
        assert_relative_eq!(rug.get(3, 3).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_aspect_drops_horizontal_components() {
        let slope = constant(3, 3, 60.0);
        let mut aspect = Array2::from_elem((3, 3), 90.0);
        aspect[[1, 1]] = FLAT_ASPECT;
        let normals = normal_components(&slope, &Raster::from_array(aspect.clone())).unwrap();
        assert_eq!(normals.x.get(1, 1), Some(0.0));
        assert_eq!(normals.y.get(1, 1), Some(0.0));
        assert_relative_eq!(normals.z.get(1, 1).unwrap(), 0.5, epsilon = 1e-12);

        // eight normals pointing east plus one (0, 0, 0.5)
        let rug = vrm(&slope, &Raster::from_array(aspect), 3).unwrap();
        let (s, c) = (60f64.to_radians().sin(), 60f64.to_radians().cos());
        let (sx, sz) = (8.0 * s, 8.0 * c + 0.5);
        let expected = 1.0 - (sx * sx + sz * sz).sqrt() / 9.0;
        assert_relative_eq!(rug.get(1, 1).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn nodata_in_window_gives_nodata() {
        let mut slope = Array2::from_elem((7, 7), 0.0);
        slope[[3, 3]] = f64::NAN;
        let aspect = constant(7, 7, FLAT_ASPECT);
        let rug = vrm(&Raster::from_array(slope), &aspect, 3).unwrap();
        for row in 2..5 {
            for col in 2..5 {
                assert_eq!(rug.get(row, col), None, "({row}, {col})");
            }
        }
        assert_eq!(rug.get(1, 1), Some(0.0));
        assert_eq!(rug.get(5, 1), Some(0.0));
        assert_eq!(rug.get(1, 4), Some(0.0));
    }

    #[test]
    fn even_or_small_windows_rejected() {
        let r = constant(5, 5, 0.0);
        for size in [0, 1, 2, 4] {
            assert!(matches!(vrm(&r, &r, size), Err(Error::InvalidParameter { .. })));
        }
    }

    #[test]
    fn scattered_normals_approach_one() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 64;
        // directions uniform on the sphere: cos(slope) uniform in [-1, 1]
        let slope = Raster::from_array(Array2::from_shape_fn((n, n), |_| {
            rng.gen_range(-1.0f64..1.0).acos().to_degrees()
        }));
        let aspect =
            Raster::from_array(Array2::from_shape_fn((n, n), |_| rng.gen_range(0.0..360.0)));

        let mean_vrm = |size| {
            let rug = vrm(&slope, &aspect, size).unwrap();
            let vals: Vec<f64> = rug.valid_values().collect();
            vals.iter().sum::<f64>() / vals.len() as f64
        };
        let (small, mid, large) = (mean_vrm(3), mean_vrm(15), mean_vrm(31));
        assert!(small < mid && mid < large, "{small} {mid} {large}");
        assert!(large > 0.9, "large window VRM {large}");
    }
}
