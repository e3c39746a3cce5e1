//! Bounded range tests used by the zone classifier.
//!
//! Each criterion of a classification rule is a [`Range`] checked against
//! one input raster. Criteria are chained: the result of one becomes the
//! value assigned by the next, so a cell keeps its class only while every
//! constrained criterion holds.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algebra::{select_constant, select_where};
use crate::error::Result;
use crate::raster::{Raster, RasterElement, INT_NODATA};

/// Optional lower and upper bound on a cell value.
///
/// Both bounds set is an open interval, `lower < v < upper`. A lone lower
/// bound means `v >= lower`, a lone upper bound `v <= upper`. No bounds at
/// all leaves the criterion unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Range {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_constrained(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    /// Whether `v` qualifies. Always true for an unconstrained range.
    pub fn contains(&self, v: f64) -> bool {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) => v > lo && v < hi,
            (Some(lo), None) => v >= lo,
            (None, Some(hi)) => v <= hi,
            (None, None) => true,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{{{}:{}}}", bound(self.lower), bound(self.upper))
    }
}

/// Outcome of one criterion in a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum CriterionResult {
    /// Mask raster: the assigned value where the chain so far holds, `0` elsewhere.
    Raster(Raster<i32>),
    /// Nothing has constrained the chain yet; carries the value to assign.
    Constant(i32),
}

impl CriterionResult {
    pub fn into_raster(self) -> Option<Raster<i32>> {
        match self {
            CriterionResult::Raster(r) => Some(r),
            CriterionResult::Constant(_) => None,
        }
    }
}

/// Apply `range` to `raster`.
///
/// Qualifying cells take their value from `true_value` (the constant, or the
/// matching cell of the previous mask) and the rest become `0`. No-data in
/// `raster` stays no-data. An unconstrained range hands a previous mask back
/// untouched and turns a constant into `Constant(fallback_value)`.
pub fn evaluate<T: RasterElement>(
    range: &Range,
    raster: &Raster<T>,
    true_value: CriterionResult,
    fallback_value: i32,
) -> Result<CriterionResult> {
    debug!(%range, input = kind(&true_value), fallback_value, "range criterion");
    if !range.is_constrained() {
        return Ok(match true_value {
            CriterionResult::Raster(r) => CriterionResult::Raster(r),
            CriterionResult::Constant(_) => CriterionResult::Constant(fallback_value),
        });
    }
    let qualifies = |v: T| v.to_f64().is_some_and(|v| range.contains(v));
    let mask = match true_value {
        CriterionResult::Constant(c) => select_constant(raster, qualifies, c, 0, INT_NODATA),
        CriterionResult::Raster(prev) => select_where(raster, qualifies, &prev, 0)?,
    };
    Ok(CriterionResult::Raster(mask))
}

fn kind(r: &CriterionResult) -> &'static str {
    match r {
        CriterionResult::Raster(_) => "raster",
        CriterionResult::Constant(_) => "constant",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn values() -> Raster<f64> {
        Raster::from_array(array![[4.0, 5.0, 7.5], [10.0, 11.0, f64::NAN]])
    }

    #[test]
    fn open_interval_excludes_bounds() {
        let range = Range::new(Some(5.0), Some(10.0));
        let out = evaluate(&range, &values(), CriterionResult::Constant(3), 3)
            .unwrap()
            .into_raster()
            .unwrap();
        assert_eq!(out.data(), &array![[0, 0, 3], [0, 0, INT_NODATA]]);
    }

    #[test]
    fn half_open_bounds_are_inclusive() {
        let at_least = Range::new(Some(5.0), None);
        let lower = evaluate(&at_least, &values(), CriterionResult::Constant(2), 2)
            .unwrap()
            .into_raster()
            .unwrap();
        assert_eq!(lower.data(), &array![[0, 2, 2], [2, 2, INT_NODATA]]);

        let at_most = Range::new(None, Some(10.0));
        let upper = evaluate(&at_most, &values(), CriterionResult::Constant(2), 2)
            .unwrap()
            .into_raster()
            .unwrap();
        assert_eq!(upper.data(), &array![[2, 2, 2], [2, 0, INT_NODATA]]);
    }

    #[test]
    fn unconstrained_passes_previous_mask_through() {
        let prev = Raster::new(array![[1, 0, 1], [0, 1, 0]], INT_NODATA);
        let chained = CriterionResult::Raster(prev.clone());
        let out = evaluate(&Range::unbounded(), &values(), chained, 9).unwrap();
        assert_eq!(out, CriterionResult::Raster(prev));
    }

    #[test]
    fn unconstrained_constant_uses_fallback() {
        let out =
            evaluate(&Range::unbounded(), &values(), CriterionResult::Constant(4), 6).unwrap();
        assert_eq!(out, CriterionResult::Constant(6));
    }

    #[test]
    fn chained_mask_only_keeps_earlier_hits() {
        let prev = Raster::new(array![[0, 5, 5], [5, 0, 5]], INT_NODATA);
        let range = Range::new(Some(5.0), None);
        let out = evaluate(&range, &values(), CriterionResult::Raster(prev), 5)
            .unwrap()
            .into_raster()
            .unwrap();
        assert_eq!(out.data(), &array![[0, 5, 5], [5, 0, INT_NODATA]]);
    }

    #[test]
    fn range_display() {
        assert_eq!(Range::new(Some(-10.0), None).to_string(), "{-10:}");
        assert_eq!(Range::new(Some(0.5), Some(2.0)).to_string(), "{0.5:2}");
    }
}
