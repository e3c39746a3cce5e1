//! Focal (moving window) statistics.
//!
//! Each row of the input is turned into a prefix sum of data values and a
//! prefix count of data cells. A window is a handful of row spans, so the
//! sum over a window costs one subtraction per span no matter how wide the
//! window is. Rows of the output are computed in parallel.

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::neighborhood::Neighborhood;
use crate::raster::Raster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocalStatistic {
    Mean,
    Sum,
}

/// What to do with no-data cells inside the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataPolicy {
    /// Skip them and reduce over the remaining cells.
    Ignore,
    /// Any no-data cell in the window makes the output no-data.
    Propagate,
}

/// What to do when the window reaches past the raster edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolicy {
    /// The output cell is no-data.
    NoData,
    /// Reduce over the part of the window inside the raster.
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocalOptions {
    pub statistic: FocalStatistic,
    pub nodata: NoDataPolicy,
    pub edge: EdgePolicy,
}

impl FocalOptions {
    /// Options used for the terrain derivatives: no-data inside the window is
    /// skipped, windows that leave the grid give no-data.
    pub fn new(statistic: FocalStatistic) -> Self {
        Self {
            statistic,
            nodata: NoDataPolicy::Ignore,
            edge: EdgePolicy::NoData,
        }
    }
}

/// Focal statistics of `raster` over `nbhd`. Output no-data is NaN.
pub fn focal_statistics(
    raster: &Raster<f64>,
    nbhd: &Neighborhood,
    opts: FocalOptions,
) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let spans = nbhd.spans();

    let prefix: Vec<(Vec<f64>, Vec<u32>)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut sums = Vec::with_capacity(cols + 1);
            let mut counts = Vec::with_capacity(cols + 1);
            let (mut s, mut n) = (0.0, 0u32);
            sums.push(s);
            counts.push(n);
            for col in 0..cols {
                let v = raster.data()[[row, col]];
                if !raster.is_nodata(v) {
                    s += v;
                    n += 1;
                }
                sums.push(s);
                counts.push(n);
            }
            (sums, counts)
        })
        .collect();

    let (nrows, ncols) = (rows as isize, cols as isize);
    let output: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let (mut sum, mut valid, mut total) = (0.0, 0u32, 0usize);
                let mut outside = false;
                for span in &spans {
                    let rr = row as isize + span.dr;
                    let mut a = col as isize + span.c0;
                    let mut b = col as isize + span.c1;
                    if rr < 0 || rr >= nrows || a < 0 || b >= ncols {
                        if opts.edge == EdgePolicy::NoData {
                            outside = true;
                            break;
                        }
                        if rr < 0 || rr >= nrows {
                            continue;
                        }
                        a = a.max(0);
                        b = b.min(ncols - 1);
                        if a > b {
                            continue;
                        }
                    }
                    let (sums, counts) = &prefix[rr as usize];
                    let (a, b) = (a as usize, b as usize + 1);
                    sum += sums[b] - sums[a];
                    valid += counts[b] - counts[a];
                    total += b - a;
                }
                if outside || valid == 0 {
                    continue;
                }
                if opts.nodata == NoDataPolicy::Propagate && valid as usize != total {
                    continue;
                }
                row_data[col] = match opts.statistic {
                    FocalStatistic::Sum => sum,
                    FocalStatistic::Mean => sum / valid as f64,
                };
            }
            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output)
        .map_err(|e| Error::EngineFailure(e.to_string()))?;
    Ok(Raster::from_array(data).with_geo(raster.geo().clone()))
}

pub fn focal_mean(raster: &Raster<f64>, nbhd: &Neighborhood) -> Result<Raster<f64>> {
    focal_statistics(raster, nbhd, FocalOptions::new(FocalStatistic::Mean))
}

pub fn focal_sum(raster: &Raster<f64>, nbhd: &Neighborhood) -> Result<Raster<f64>> {
    focal_statistics(raster, nbhd, FocalOptions::new(FocalStatistic::Sum))
}
