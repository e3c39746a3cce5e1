//! Raster algebra primitives.
//!
//! Plain functions over [`Raster`] values. No-data in any operand yields
//! no-data in the result.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::raster::{Raster, RasterElement, INT_NODATA};

pub fn add(a: &Raster<f64>, b: &Raster<f64>) -> Result<Raster<f64>> {
    a.zip_map(b, f64::NAN, |x, y| x + y)
}

pub fn subtract(a: &Raster<f64>, b: &Raster<f64>) -> Result<Raster<f64>> {
    a.zip_map(b, f64::NAN, |x, y| x - y)
}

pub fn multiply(a: &Raster<f64>, b: &Raster<f64>) -> Result<Raster<f64>> {
    a.zip_map(b, f64::NAN, |x, y| x * y)
}

/// Division by zero gives no-data.
pub fn divide(a: &Raster<f64>, b: &Raster<f64>) -> Result<Raster<f64>> {
    a.zip_map(b, f64::NAN, |x, y| if y == 0.0 { f64::NAN } else { x / y })
}

pub fn offset(a: &Raster<f64>, k: f64) -> Raster<f64> {
    a.map(f64::NAN, |x| x + k)
}

pub fn scale(a: &Raster<f64>, k: f64) -> Raster<f64> {
    a.map(f64::NAN, |x| x * k)
}

pub fn power(a: &Raster<f64>, p: f64) -> Raster<f64> {
    a.map(f64::NAN, |x| x.powf(p))
}

pub fn sqrt(a: &Raster<f64>) -> Raster<f64> {
    a.map(f64::NAN, f64::sqrt)
}

pub fn sin(a: &Raster<f64>) -> Raster<f64> {
    a.map(f64::NAN, f64::sin)
}

pub fn cos(a: &Raster<f64>) -> Raster<f64> {
    a.map(f64::NAN, f64::cos)
}

pub fn to_radians(a: &Raster<f64>) -> Raster<f64> {
    a.map(f64::NAN, f64::to_radians)
}

/// Integer rounding as `Int(x + 0.5)` behaves on the BPI outputs: add one
/// half then floor. Halves always go towards positive infinity, for negative
/// differences too (`-2.5 -> -2`, `-2.7 -> -3`).
#[inline]
pub fn arc_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Round every cell with [`arc_round`] into an integer raster.
pub fn round_to_int(a: &Raster<f64>) -> Raster<i32> {
    a.map(INT_NODATA, |x| {
        let r = arc_round(x);
        if r.is_finite() && r > i32::MIN as f64 && r <= i32::MAX as f64 {
            r as i32
        } else {
            INT_NODATA
        }
    })
}

/// Conditional select: where `pred(cond)` holds take `when_true`, otherwise
/// `when_false`. No-data in `cond` or in the chosen `when_true` cell stays
/// no-data.
pub fn select_where<T, U, P>(
    cond: &Raster<T>,
    pred: P,
    when_true: &Raster<U>,
    when_false: U,
) -> Result<Raster<U>>
where
    T: RasterElement,
    U: RasterElement,
    P: Fn(T) -> bool + Sync + Send,
{
    cond.ensure_aligned(when_true)?;
    let nodata = when_true.nodata();
    let data = ndarray::Zip::from(cond.data())
        .and(when_true.data())
        .par_map_collect(|&c, &t| {
            if cond.is_nodata(c) {
                nodata
            } else if pred(c) {
                t
            } else {
                when_false
            }
        });
    Ok(Raster::new(data, nodata).with_geo(cond.geo().clone()))
}

/// [`select_where`] with a constant in place of the `when_true` raster.
pub fn select_constant<T, U, P>(
    cond: &Raster<T>,
    pred: P,
    when_true: U,
    when_false: U,
    nodata: U,
) -> Raster<U>
where
    T: RasterElement,
    U: RasterElement,
    P: Fn(T) -> bool + Sync + Send,
{
    cond.map(nodata, |c| if pred(c) { when_true } else { when_false })
}

/// Whole-raster summary statistics over the data cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

/// Summary statistics of all data cells, `None` if every cell is no-data.
pub fn statistics<T: RasterElement>(a: &Raster<T>) -> Option<Statistics> {
    let values: Vec<f64> = a.valid_values().filter_map(|v| v.to_f64()).collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    Some(Statistics {
        count: values.len(),
        min,
        max,
        mean,
        std: var.sqrt(),
    })
}
