//! Rule based benthic zone classification.
//!
//! A classification table is an ordered list of [`ClassificationRule`]s.
//! Each rule constrains depth, slope, fine and broad standardised BPI, and
//! its criteria are chained in the fixed order depth, slope, fine BPI,
//! broad BPI (see [`crate::predicate`]). The per-rule masks are merged in
//! table order with the first rule that claims a cell keeping it, so the
//! order of the table is the priority of the zones.

use std::collections::BTreeMap;

use ndarray::Zip;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::predicate::{evaluate, CriterionResult, Range};
use crate::raster::{Raster, INT_NODATA};

/// Zone name for cells no rule claimed (value `0`).
pub const UNCLASSIFIED_ZONE: &str = "None";

/// Zone name for a raster value missing from the zone key.
pub const NO_MATCHING_ZONE: &str = "No Matching Zone";

/// One row of the classification table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub class_id: i32,
    pub zone_name: String,
    pub depth: Range,
    pub slope: Range,
    pub broad_bpi: Range,
    pub fine_bpi: Range,
}

impl ClassificationRule {
    /// A rule with every criterion unconstrained.
    pub fn new(class_id: i32, zone_name: impl Into<String>) -> Self {
        Self {
            class_id,
            zone_name: zone_name.into(),
            depth: Range::unbounded(),
            slope: Range::unbounded(),
            broad_bpi: Range::unbounded(),
            fine_bpi: Range::unbounded(),
        }
    }

    pub fn with_depth(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.depth = Range::new(lower, upper);
        self
    }

    pub fn with_slope(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.slope = Range::new(lower, upper);
        self
    }

    pub fn with_broad_bpi(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.broad_bpi = Range::new(lower, upper);
        self
    }

    pub fn with_fine_bpi(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.fine_bpi = Range::new(lower, upper);
        self
    }

    /// The constrained criteria, formatted for diagnostics, e.g.
    /// `depth: {-100:}, broad: {:-100}`.
    pub fn constrained_criteria(&self) -> String {
        [
            ("depth", &self.depth),
            ("slope", &self.slope),
            ("broad", &self.broad_bpi),
            ("fine", &self.fine_bpi),
        ]
        .iter()
        .filter(|(_, r)| r.is_constrained())
        .map(|(name, r)| format!("{name}: {r}"))
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Class id to zone name lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneKey(BTreeMap<i32, String>);

impl Default for ZoneKey {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneKey {
    /// A key holding only the reserved `0 -> "None"` entry.
    pub fn new() -> Self {
        let mut map = BTreeMap::new();
        map.insert(0, UNCLASSIFIED_ZONE.to_string());
        Self(map)
    }

    pub fn insert(&mut self, class_id: i32, zone_name: impl Into<String>) {
        self.0.insert(class_id, zone_name.into());
    }

    /// Zone name for `value`, [`NO_MATCHING_ZONE`] when it is not in the key.
    pub fn zone(&self, value: i32) -> &str {
        self.0.get(&value).map(String::as_str).unwrap_or(NO_MATCHING_ZONE)
    }

    pub fn contains(&self, value: i32) -> bool {
        self.0.contains_key(&value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row of the zone attribute table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneCount {
    pub value: i32,
    pub zone: String,
    pub count: usize,
}

/// Classified raster together with its zone key.
#[derive(Debug, Clone)]
pub struct ZoneRaster {
    pub raster: Raster<i32>,
    pub key: ZoneKey,
}

impl ZoneRaster {
    pub fn zone_at(&self, row: usize, col: usize) -> Option<&str> {
        self.raster.get(row, col).map(|v| self.key.zone(v))
    }

    /// Distinct values with their zone name and cell count, by value.
    pub fn zone_table(&self) -> Vec<ZoneCount> {
        let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
        for v in self.raster.valid_values() {
            *counts.entry(v).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(value, count)| ZoneCount {
                value,
                zone: self.key.zone(value).to_string(),
                count,
            })
            .collect()
    }

    pub fn into_parts(self) -> (Raster<i32>, ZoneKey) {
        (self.raster, self.key)
    }
}

/// The four rasters a classification runs over, checked to share one grid.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    bathymetry: &'a Raster<f64>,
    slope: &'a Raster<f64>,
    fine_std_bpi: &'a Raster<i32>,
    broad_std_bpi: &'a Raster<i32>,
}

impl<'a> Classifier<'a> {
    pub fn new(
        bathymetry: &'a Raster<f64>,
        slope: &'a Raster<f64>,
        fine_std_bpi: &'a Raster<i32>,
        broad_std_bpi: &'a Raster<i32>,
    ) -> Result<Self> {
        bathymetry.ensure_aligned(slope)?;
        bathymetry.ensure_aligned(fine_std_bpi)?;
        bathymetry.ensure_aligned(broad_std_bpi)?;
        Ok(Self {
            bathymetry,
            slope,
            fine_std_bpi,
            broad_std_bpi,
        })
    }

    /// Chain the four criteria of `rule`. The result is a
    /// [`CriterionResult::Constant`] when the rule constrains nothing.
    pub fn rule_mask(&self, rule: &ClassificationRule) -> Result<CriterionResult> {
        let id = rule.class_id;
        let depth = evaluate(&rule.depth, self.bathymetry, CriterionResult::Constant(id), id)?;
        let slope = evaluate(&rule.slope, self.slope, depth, id)?;
        let fine = evaluate(&rule.fine_bpi, self.fine_std_bpi, slope, id)?;
        evaluate(&rule.broad_bpi, self.broad_std_bpi, fine, id)
    }

    /// Classify with every usable mask handed to `inspect` before merging.
    ///
    /// Masks are built in parallel; the merge runs in table order.
    pub fn classify_inspect<F>(
        &self,
        rules: &[ClassificationRule],
        mut inspect: F,
    ) -> Result<ZoneRaster>
    where
        F: FnMut(&ClassificationRule, &Raster<i32>) -> Result<()>,
    {
        let masks = rules
            .par_iter()
            .map(|rule| self.rule_mask(rule))
            .collect::<Result<Vec<_>>>()?;

        let mut key = ZoneKey::new();
        let mut grids = Vec::new();
        for (rule, mask) in rules.iter().zip(masks) {
            info!(
                class_id = rule.class_id,
                zone = %rule.zone_name,
                "Calculating grid for {}",
                rule.zone_name
            );
            match mask.into_raster().filter(has_class_cells) {
                Some(mask) => {
                    inspect(rule, &mask)?;
                    key.insert(rule.class_id, rule.zone_name.clone());
                    grids.push(mask);
                }
                None => {
                    warn!(
                        class_id = rule.class_id,
                        zone = %rule.zone_name,
                        criteria = %rule.constrained_criteria(),
                        "no valid locations found for class {}",
                        rule.zone_name
                    );
                }
            }
        }

        let raster = merge_masks(&grids)?;
        Ok(ZoneRaster { raster, key })
    }

    pub fn classify(&self, rules: &[ClassificationRule]) -> Result<ZoneRaster> {
        self.classify_inspect(rules, |_, _| Ok(()))
    }
}

fn has_class_cells(mask: &Raster<i32>) -> bool {
    mask.valid_values().any(|v| v != 0)
}

/// Classify the four derivative rasters with an ordered rule table.
///
/// Fails with [`Error::NoValidClasses`] when no rule yields any cell.
pub fn classify(
    rules: &[ClassificationRule],
    bathymetry: &Raster<f64>,
    slope: &Raster<f64>,
    fine_std_bpi: &Raster<i32>,
    broad_std_bpi: &Raster<i32>,
) -> Result<ZoneRaster> {
    Classifier::new(bathymetry, slope, fine_std_bpi, broad_std_bpi)?.classify(rules)
}

/// Fold masks in priority order: a later mask only fills cells that are
/// still `0`. No-data in the running result stays no-data.
pub fn merge_masks(masks: &[Raster<i32>]) -> Result<Raster<i32>> {
    let (first, rest) = masks.split_first().ok_or(Error::NoValidClasses)?;
    let mut merged = first.data().clone();
    for mask in rest {
        first.ensure_aligned(mask)?;
        Zip::from(&mut merged).and(mask.data()).for_each(|acc, &m| {
            if *acc == 0 {
                *acc = if mask.is_nodata(m) { INT_NODATA } else { m };
            }
        });
    }
    Ok(Raster::new(merged, INT_NODATA).with_geo(first.geo().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn merge_keeps_first_claim() {
        let a = Raster::new(array![[1, 1, 0, 0]], INT_NODATA);
        let b = Raster::new(array![[0, 2, 2, 0]], INT_NODATA);
        let merged = merge_masks(&[a, b]).unwrap();
        assert_eq!(merged.data(), &array![[1, 1, 2, 0]]);
    }

    #[test]
    fn merge_leaves_nodata() {
        let a = Raster::new(array![[INT_NODATA, 0]], INT_NODATA);
        let b = Raster::new(array![[3, INT_NODATA]], INT_NODATA);
        let merged = merge_masks(&[a, b]).unwrap();
        assert_eq!(merged.data(), &array![[INT_NODATA, INT_NODATA]]);
    }

    #[test]
    fn merge_of_nothing() {
        assert!(matches!(merge_masks(&[]), Err(Error::NoValidClasses)));
    }

    #[test]
    fn zone_key_fallback() {
        let mut key = ZoneKey::new();
        key.insert(2, "Crest");
        assert_eq!(key.zone(0), UNCLASSIFIED_ZONE);
        assert_eq!(key.zone(2), "Crest");
        assert_eq!(key.zone(7), NO_MATCHING_ZONE);
    }

    #[test]
    fn criteria_listing() {
        let rule = ClassificationRule::new(1, "Flat")
            .with_depth(Some(-100.0), None)
            .with_broad_bpi(None, Some(-100.0));
        assert_eq!(rule.constrained_criteria(), "depth: {-100:}, broad: {:-100}");
    }

    #[test]
    fn zone_table_counts() {
        let mut key = ZoneKey::new();
        key.insert(1, "Depression");
        let zr = ZoneRaster {
            raster: Raster::new(array![[1, 1, 0], [5, INT_NODATA, 1]], INT_NODATA),
            key,
        };
        let table = zr.zone_table();
        assert_eq!(
            table,
            vec![
                ZoneCount { value: 0, zone: "None".into(), count: 1 },
                ZoneCount { value: 1, zone: "Depression".into(), count: 3 },
                ZoneCount { value: 5, zone: NO_MATCHING_ZONE.into(), count: 1 },
            ]
        );
        assert_eq!(zr.zone_at(1, 1), None);
        assert_eq!(zr.zone_at(1, 0), Some(NO_MATCHING_ZONE));
    }
}
