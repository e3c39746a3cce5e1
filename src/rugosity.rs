//! Arc-chord ratio (ACR) rugosity.
//!
//! Rugosity of a whole surface as the ratio of its 3D area to the area of a
//! plane of best fit over the same domain. Using a fitted plane rather than
//! the horizontal projection keeps a smooth but steep slope at 1.
//!
//! The surface is triangulated on cell centres: every 2x2 block of valid
//! cells gives two triangles. The plane is a first order polynomial fitted by
//! least squares to the boundary cells of the valid domain, so the fit follows
//! the overall trend of the area rather than its interior relief.
//!
//! Reference:
//! Du Preez, C. (2015). A new arc-chord ratio (ACR) rugosity index for
//! quantifying three-dimensional landscape structural complexity.
//! Landscape Ecology, 30, 181–192.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::raster::Raster;
use crate::surface::aspect_from_gradient;

/// Whole-surface ACR result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcrResult {
    /// 3D area of the triangulated surface.
    pub surface_area: f64,
    /// Area of the plane of best fit over the same domain.
    pub planar_area: f64,
    /// `surface_area / planar_area`, 1 for a planar surface.
    pub rugosity: f64,
    /// Slope of the fitted plane in degrees.
    pub slope: f64,
    /// Aspect of the fitted plane in degrees, `-1` when it is level.
    pub aspect: f64,
}

/// `z = c0 + cx * x + cy * y` in map units, y pointing north.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub c0: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Plane {
    pub fn z(&self, x: f64, y: f64) -> f64 {
        self.c0 + self.cx * x + self.cy * y
    }
}

/// Valid cells with at least one 4-neighbour that is no-data or off the grid.
pub fn boundary_cells(bathy: &Raster<f64>) -> Vec<(usize, usize)> {
    let (rows, cols) = bathy.shape();
    let is_valid = |r: isize, c: isize| {
        r >= 0 && c >= 0 && bathy.get(r as usize, c as usize).is_some()
    };
    (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .filter(|&(r, c)| {
            let (ri, ci) = (r as isize, c as isize);
            is_valid(ri, ci)
                && [(-1, 0), (1, 0), (0, -1), (0, 1)]
                    .iter()
                    .any(|(dr, dc)| !is_valid(ri + dr, ci + dc))
        })
        .collect()
}

/// Least squares plane through the given cells.
pub fn fit_plane(bathy: &Raster<f64>, cells: &[(usize, usize)]) -> Result<Plane> {
    let (resx, resy) = bathy.cell_size();
    // normal equations, accumulated about the centroid for conditioning
    let points: Vec<(f64, f64, f64)> = cells
        .iter()
        .filter_map(|&(r, c)| bathy.get(r, c).map(|z| (c as f64 * resx, -(r as f64) * resy, z)))
        .collect();
    let n = points.len() as f64;
    if points.len() < 3 {
        return Err(Error::DegenerateInput(format!(
            "{} boundary cells, a plane needs at least 3",
            points.len()
        )));
    }
    let (mx, my, mz) = points
        .iter()
        .fold((0.0, 0.0, 0.0), |(a, b, c), &(x, y, z)| (a + x, b + y, c + z));
    let (mx, my, mz) = (mx / n, my / n, mz / n);

    let (mut sxx, mut sxy, mut syy, mut sxz, mut syz) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(x, y, z) in &points {
        let (dx, dy, dz) = (x - mx, y - my, z - mz);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
        sxz += dx * dz;
        syz += dy * dz;
    }
    let det = sxx * syy - sxy * sxy;
    if det.abs() <= f64::EPSILON * (sxx * syy).max(1.0) {
        return Err(Error::DegenerateInput("boundary cells are collinear".into()));
    }
    let cx = (sxz * syy - syz * sxy) / det;
    let cy = (syz * sxx - sxz * sxy) / det;
    Ok(Plane {
        c0: mz - cx * mx - cy * my,
        cx,
        cy,
    })
}

fn triangle_area(p: [f64; 3], q: [f64; 3], r: [f64; 3]) -> f64 {
    let u = [q[0] - p[0], q[1] - p[1], q[2] - p[2]];
    let v = [r[0] - p[0], r[1] - p[1], r[2] - p[2]];
    let cross = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    0.5 * (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt()
}

/// Surface area of the triangulated bathymetry and the number of 2x2
/// blocks it covers.
pub fn surface_area(bathy: &Raster<f64>) -> (f64, usize) {
    let (rows, cols) = bathy.shape();
    let (resx, resy) = bathy.cell_size();
    (0..rows.saturating_sub(1))
        .into_par_iter()
        .map(|r| {
            let mut area = 0.0;
            let mut blocks = 0;
            for c in 0..cols.saturating_sub(1) {
                let corner = |dr: usize, dc: usize| {
                    bathy
                        .get(r + dr, c + dc)
                        .map(|z| [(c + dc) as f64 * resx, -((r + dr) as f64) * resy, z])
                };
                let (Some(a), Some(b), Some(d), Some(e)) =
                    (corner(0, 0), corner(0, 1), corner(1, 0), corner(1, 1))
                else {
                    continue;
                };
                area += triangle_area(a, b, d) + triangle_area(b, e, d);
                blocks += 1;
            }
            (area, blocks)
        })
        .reduce(|| (0.0, 0), |x, y| (x.0 + y.0, x.1 + y.1))
}

/// Arc-chord ratio rugosity of the valid extent of `bathy`.
///
/// Fails with [`Error::DegenerateInput`] when the raster has no 2x2 block of
/// valid cells or its boundary does not define a plane.
pub fn acr(bathy: &Raster<f64>) -> Result<AcrResult> {
    let (resx, resy) = bathy.cell_size();
    if resx <= 0.0 || resy <= 0.0 {
        return Err(Error::invalid("cell_size", format!("{resx}x{resy}"), "must be positive"));
    }

    info!("Calculating ACR rugosity");
    let (surface_area, blocks) = surface_area(bathy);
    if blocks == 0 {
        return Err(Error::DegenerateInput("no 2x2 block of valid cells".into()));
    }

    let boundary = boundary_cells(bathy);
    let plane = fit_plane(bathy, &boundary)?;

    // each block projects to resx * resy; the plane stretches that uniformly
    let stretch = (1.0 + plane.cx * plane.cx + plane.cy * plane.cy).sqrt();
    let planar_area = blocks as f64 * resx * resy * stretch;

    // row-down gradient, matching the Horn convention in `surface`
    let (dz_dx, dz_dy) = (plane.cx, -plane.cy);
    let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
    let aspect = aspect_from_gradient(dz_dx, dz_dy);

    Ok(AcrResult {
        surface_area,
        planar_area,
        rugosity: surface_area / planar_area,
        slope,
        aspect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoInfo;
    use crate::surface::FLAT_ASPECT;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn grid(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        Raster::from_array(Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)))
            .with_geo(GeoInfo::with_cell_size(5.0, 5.0))
    }

    #[test]
    fn flat_surface_is_one() {
        let res = acr(&grid(6, 8, |_, _| -120.0)).unwrap();
        assert_relative_eq!(res.rugosity, 1.0, epsilon = 1e-12);
        assert_relative_eq!(res.surface_area, 5.0 * 7.0 * 25.0, epsilon = 1e-9);
        assert_eq!(res.slope, 0.0);
        assert_eq!(res.aspect, FLAT_ASPECT);
    }

    #[test]
    fn tilted_plane_is_one() {
        // rises half a metre per metre towards the east
        let res = acr(&grid(7, 7, |_, c| -100.0 + 0.5 * 5.0 * c as f64)).unwrap();
        assert_relative_eq!(res.rugosity, 1.0, epsilon = 1e-9);
        assert_relative_eq!(res.slope, 0.5f64.atan().to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(res.aspect, 270.0, epsilon = 1e-9);
    }

    #[test]
    fn bumpy_surface_is_rougher() {
        let res = acr(&grid(9, 9, |r, c| if (r + c) % 2 == 0 { -50.0 } else { -54.0 })).unwrap();
        assert!(res.rugosity > 1.0, "{}", res.rugosity);
    }

    #[test]
    fn holes_move_the_boundary() {
        let mut dem = grid(6, 6, |_, _| -10.0);
        let mut data = dem.clone().into_data();
        data[[2, 2]] = f64::NAN;
        dem = Raster::from_array(data).with_geo(dem.geo().clone());
        let boundary = boundary_cells(&dem);
        assert!(boundary.contains(&(1, 2)));
        assert!(!boundary.contains(&(2, 2)));
        assert!(!boundary.contains(&(4, 4)));
        let res = acr(&dem).unwrap();
        // 25 blocks minus the four touching the hole
        assert_relative_eq!(res.planar_area, 21.0 * 25.0, epsilon = 1e-9);
    }

    #[test]
    fn single_row_has_no_surface() {
        assert!(matches!(acr(&grid(1, 5, |_, c| c as f64)), Err(Error::DegenerateInput(_))));
    }
}
