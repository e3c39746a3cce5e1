//! In-memory raster grid: an `Array2` of cell values, a no-data sentinel and
//! the georeferencing needed to write it back out.
//!
//! Rasters are values. Every operation in this crate takes `&Raster<T>` and
//! returns a new raster; nothing is modified in place.

use std::fmt::Debug;

use ndarray::{Array2, Zip};
use num::{Bounded, NumCast, ToPrimitive};

use crate::error::{Error, Result};

/// Cell types a [`Raster`] can hold.
pub trait RasterElement:
    Copy + PartialEq + PartialOrd + Debug + Send + Sync + NumCast + ToPrimitive + Bounded + 'static
{
    fn is_nan(self) -> bool {
        false
    }
}

macro_rules! int_element {
    ($($t:ty),*) => { $(impl RasterElement for $t {})* };
}

int_element!(u8, u16, u32, i16, i32, i64);

impl RasterElement for f32 {
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

impl RasterElement for f64 {
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

/// No-data sentinel used for integer rasters produced by this crate.
pub const INT_NODATA: i32 = i32::MIN;

/// Georeferencing carried alongside a raster.
///
/// `transform` is the usual six-term affine transform
/// `[origin_x, resx, 0, origin_y, 0, -resy]`. The GeoKey directory and the
/// GeoAscii parameters are passed through untouched; CRS handling is left to
/// whatever reads the output.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoInfo {
    pub transform: [f64; 6],
    pub geokeys: Vec<u16>,
    pub ascii_params: String,
}

impl Default for GeoInfo {
    fn default() -> Self {
        Self {
            transform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
            geokeys: Vec::new(),
            ascii_params: String::new(),
        }
    }
}

impl GeoInfo {
    pub fn with_cell_size(resx: f64, resy: f64) -> Self {
        Self {
            transform: [0.0, resx, 0.0, 0.0, 0.0, -resy],
            ..Self::default()
        }
    }

    /// EPSG code from the GeoKey directory: the projected CRS
    /// (key 3072) if present, else the geographic one (key 2048).
    pub fn epsg(&self) -> Option<u16> {
        let entries = self.geokeys.get(4..)?;
        let inline = |wanted: u16| {
            entries
                .chunks_exact(4)
                .find(|e| e[0] == wanted && e[1] == 0)
                .map(|e| e[3])
        };
        inline(3072).or_else(|| inline(2048))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    data: Array2<T>,
    nodata: T,
    geo: GeoInfo,
}

impl<T: RasterElement> Raster<T> {
    /// Wrap `data` with the given no-data sentinel and unit cell size.
    pub fn new(data: Array2<T>, nodata: T) -> Self {
        Self {
            data,
            nodata,
            geo: GeoInfo::default(),
        }
    }

    /// A raster of `shape` with every cell set to `value`.
    pub fn filled(shape: (usize, usize), value: T, nodata: T) -> Self {
        Self::new(Array2::from_elem(shape, value), nodata)
    }

    pub fn with_geo(mut self, geo: GeoInfo) -> Self {
        self.geo = geo;
        self
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn into_data(self) -> Array2<T> {
        self.data
    }

    pub fn nodata(&self) -> T {
        self.nodata
    }

    pub fn geo(&self) -> &GeoInfo {
        &self.geo
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Cell size as `(width, height)`, always positive.
    pub fn cell_size(&self) -> (f64, f64) {
        (self.geo.transform[1].abs(), self.geo.transform[5].abs())
    }

    #[inline]
    pub fn is_nodata(&self, v: T) -> bool {
        v == self.nodata || v.is_nan()
    }

    /// Value at `(row, col)`, or `None` when the cell is no-data or outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.data
            .get((row, col))
            .copied()
            .filter(|&v| !self.is_nodata(v))
    }

    /// All cells that hold data, in row-major order.
    pub fn valid_values(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied().filter(move |&v| !self.is_nodata(v))
    }

    pub fn valid_count(&self) -> usize {
        self.valid_values().count()
    }

    /// Fails with [`Error::ShapeMismatch`] unless `other` covers the same grid.
    pub fn ensure_aligned<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        Ok(())
    }

    /// Apply `f` to every data cell. No-data cells map to `nodata`.
    pub fn map<U, F>(&self, nodata: U, f: F) -> Raster<U>
    where
        U: RasterElement,
        F: Fn(T) -> U + Sync + Send,
    {
        let data = Zip::from(&self.data)
            .par_map_collect(|&v| if self.is_nodata(v) { nodata } else { f(v) });
        Raster {
            data,
            nodata,
            geo: self.geo.clone(),
        }
    }

    /// Combine two aligned rasters cell by cell. A cell that is no-data in
    /// either input is no-data in the output.
    pub fn zip_map<U, V, F>(&self, other: &Raster<U>, nodata: V, f: F) -> Result<Raster<V>>
    where
        U: RasterElement,
        V: RasterElement,
        F: Fn(T, U) -> V + Sync + Send,
    {
        self.ensure_aligned(other)?;
        let data = Zip::from(&self.data)
            .and(&other.data)
            .par_map_collect(|&a, &b| {
                if self.is_nodata(a) || other.is_nodata(b) {
                    nodata
                } else {
                    f(a, b)
                }
            });
        Ok(Raster {
            data,
            nodata,
            geo: self.geo.clone(),
        })
    }

    /// Convert the cell type. Values that do not fit in `U` become no-data.
    pub fn cast<U: RasterElement>(&self, nodata: U) -> Raster<U> {
        self.map(nodata, |v| <U as NumCast>::from(v).unwrap_or(nodata))
    }
}

impl Raster<f64> {
    /// Shorthand for a floating point raster whose no-data value is NaN.
    pub fn from_array(data: Array2<f64>) -> Self {
        Self::new(data, f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn filled_and_cast() {
        let depth = Raster::filled((2, 3), -12.6, f64::NAN);
        assert_eq!(depth.shape(), (2, 3));
        assert_eq!(depth.valid_count(), 6);

        let r = Raster::new(array![[-12.0, f64::NAN], [3.0e10, 7.0]], f64::NAN);
        let ints = r.cast(INT_NODATA);
        assert_eq!(ints.data(), &array![[-12, INT_NODATA], [INT_NODATA, 7]]);
        assert_eq!(ints.nodata(), INT_NODATA);
    }

    #[test]
    fn nodata_cells_are_skipped() {
        let r = Raster::new(array![[1.0, -9999.0], [f64::NAN, 4.0]], -9999.0);
        assert_eq!(r.valid_count(), 2);
        assert_eq!(r.get(0, 1), None);
        assert_eq!(r.get(1, 0), None);
        assert_eq!(r.get(1, 1), Some(4.0));
        assert_eq!(r.get(5, 5), None);
    }

    #[test]
    fn map_preserves_nodata() {
        let r = Raster::new(array![[1, 2], [INT_NODATA, 4]], INT_NODATA);
        let doubled = r.map(-1.0, |v| v as f64 * 2.0);
        assert_eq!(doubled.data(), &array![[2.0, 4.0], [-1.0, 8.0]]);
    }

    #[test]
    fn zip_map_rejects_misaligned() {
        let a = Raster::from_array(Array2::zeros((2, 2)));
        let b = Raster::from_array(Array2::zeros((2, 3)));
        assert!(matches!(
            a.zip_map(&b, f64::NAN, |x, y| x + y),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn epsg_from_geokeys() {
        let geo = GeoInfo {
            geokeys: vec![1, 1, 0, 3, 1024, 0, 1, 1, 1026, 34737, 48, 0, 3072, 0, 1, 2193],
            ..GeoInfo::default()
        };
        assert_eq!(geo.epsg(), Some(2193));
        assert_eq!(GeoInfo::default().epsg(), None);
    }

    #[test]
    fn cell_size_is_positive() {
        let r =
            Raster::from_array(Array2::zeros((1, 1))).with_geo(GeoInfo::with_cell_size(20.0, 20.0));
        assert_eq!(r.cell_size(), (20.0, 20.0));
    }
}
