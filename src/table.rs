//! Classification table and zone attribute table files (CSV).
//!
//! The classification table has one row per class:
//!
//! ```text
//! Class,Zone,Depth_LowerBounds,Depth_UpperBounds,Slope_LowerBounds,Slope_UpperBounds,LSB_LowerBounds,LSB_UpperBounds,SSB_LowerBounds,SSB_UpperBounds
//! 1,Depression,,,,,,,,-100
//! ```
//!
//! `LSB` is the fine scale BPI, `SSB` the broad scale BPI. Blank bounds are
//! unconstrained. Rows keep their file order, which is the zone priority.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::Deserialize;

use crate::classify::{ClassificationRule, ZoneCount};
use crate::error::{Error, Result};
use crate::predicate::Range;

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(rename = "Class")]
    class: i32,
    #[serde(rename = "Zone")]
    zone: String,
    #[serde(rename = "Depth_LowerBounds")]
    depth_lower: Option<f64>,
    #[serde(rename = "Depth_UpperBounds")]
    depth_upper: Option<f64>,
    #[serde(rename = "Slope_LowerBounds")]
    slope_lower: Option<f64>,
    #[serde(rename = "Slope_UpperBounds")]
    slope_upper: Option<f64>,
    #[serde(rename = "LSB_LowerBounds")]
    fine_lower: Option<f64>,
    #[serde(rename = "LSB_UpperBounds")]
    fine_upper: Option<f64>,
    #[serde(rename = "SSB_LowerBounds")]
    broad_lower: Option<f64>,
    #[serde(rename = "SSB_UpperBounds")]
    broad_upper: Option<f64>,
}

impl TableRow {
    fn into_rule(self) -> Result<ClassificationRule> {
        if self.class <= 0 {
            return Err(Error::invalid(
                "Class",
                self.class,
                "class values must be positive, 0 is reserved for unclassified cells",
            ));
        }
        Ok(ClassificationRule {
            class_id: self.class,
            zone_name: self.zone,
            depth: Range::new(self.depth_lower, self.depth_upper),
            slope: Range::new(self.slope_lower, self.slope_upper),
            broad_bpi: Range::new(self.broad_lower, self.broad_upper),
            fine_bpi: Range::new(self.fine_lower, self.fine_upper),
        })
    }
}

/// Parse a classification table from any reader.
pub fn parse_classification_table<R: Read>(reader: R) -> Result<Vec<ClassificationRule>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    csv.deserialize::<TableRow>()
        .map(|row| row.map_err(Error::from).and_then(TableRow::into_rule))
        .collect()
}

/// Read the classification table at `path`.
pub fn read_classification_table(path: &Path) -> Result<Vec<ClassificationRule>> {
    parse_classification_table(File::open(path)?)
}

/// Write the zone attribute table (`Value,Zone,Count`).
pub fn write_zone_table<W: Write>(writer: W, rows: &[ZoneCount]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["Value", "Zone", "Count"])?;
    for row in rows {
        csv.write_record([row.value.to_string(), row.zone.clone(), row.count.to_string()])?;
    }
    csv.flush()?;
    Ok(())
}
