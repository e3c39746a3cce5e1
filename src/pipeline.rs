//! End to end benthic terrain classification.
//!
//! From one bathymetry raster and a classification table the pipeline
//! writes, into `output_dir`:
//!
//! ```text
//! <basename>_BPI_broad.tif     <basename>_stdBPI_broad.tif
//! <basename>_BPI_fine.tif      <basename>_stdBPI_fine.tif
//! <basename>_Slope.tif         <basename>_Classified.tif
//! <basename>_Classified.zones.csv
//! <basename>_VRM_<n>.tif       (only with `vrm_neighborhood`)
//! ```
//!
//! Settings come from a JSON file, for example
//!
//! ```json
//! {
//!   "bathymetry": "Bathy/SoG_20m.tif",
//!   "output_dir": "Derivatives",
//!   "classification_table": "Classify/bathy_classification.csv",
//!   "broad": { "inner_radius": 200, "outer_radius": 500 },
//!   "engine": { "compression": "lzw", "keep_intermediates": true }
//! }
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bpi::{bpi, stdbpi};
use crate::classify::{Classifier, ZoneCount};
use crate::engine::{EngineConfig, RasterEngine};
use crate::error::{Error, Result};
use crate::neighborhood::Neighborhood;
use crate::raster::Raster;
use crate::ruggedness::{validate_window, vrm};
use crate::surface;
use crate::table::{read_classification_table, write_zone_table};

/// Annulus radii, in cells, for one BPI scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpiScale {
    pub inner_radius: usize,
    pub outer_radius: usize,
}

impl BpiScale {
    pub const BROAD: BpiScale = BpiScale { inner_radius: 200, outer_radius: 500 };
    pub const FINE: BpiScale = BpiScale { inner_radius: 5, outer_radius: 200 };
}

fn default_broad() -> BpiScale {
    BpiScale::BROAD
}

fn default_fine() -> BpiScale {
    BpiScale::FINE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub bathymetry: PathBuf,
    pub output_dir: PathBuf,
    pub classification_table: PathBuf,
    /// Output name prefix. Defaults to the bathymetry file stem.
    #[serde(default)]
    pub basename: Option<String>,
    #[serde(default = "default_broad")]
    pub broad: BpiScale,
    #[serde(default = "default_fine")]
    pub fine: BpiScale,
    /// VRM window side; no VRM raster is written when unset.
    #[serde(default)]
    pub vrm_neighborhood: Option<usize>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PipelineConfig {
    pub fn new(
        bathymetry: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        classification_table: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bathymetry: bathymetry.into(),
            output_dir: output_dir.into(),
            classification_table: classification_table.into(),
            basename: None,
            broad: BpiScale::BROAD,
            fine: BpiScale::FINE,
            vrm_neighborhood: None,
            engine: EngineConfig::default(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config: Self = serde_json::from_reader(std::io::BufReader::new(File::open(path)?))?;
        Ok(config)
    }

    pub fn basename(&self) -> String {
        self.basename.clone().unwrap_or_else(|| {
            self.bathymetry
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "bathymetry".to_string())
        })
    }

    /// Check radii and window size before any raster is read.
    pub fn validate(&self) -> Result<()> {
        Neighborhood::annulus(self.broad.inner_radius, self.broad.outer_radius)?;
        Neighborhood::annulus(self.fine.inner_radius, self.fine.outer_radius)?;
        if let Some(size) = self.vrm_neighborhood {
            validate_window(size)?;
        }
        Ok(())
    }
}

/// Files written by [`run`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutputs {
    pub broad_bpi: PathBuf,
    pub broad_std_bpi: PathBuf,
    pub fine_bpi: PathBuf,
    pub fine_std_bpi: PathBuf,
    pub slope: PathBuf,
    pub classified: PathBuf,
    pub zone_table: PathBuf,
    pub vrm: Option<PathBuf>,
    /// Scratch directory holding the `con_<zone>.tif` masks, kept only with
    /// `keep_intermediates`.
    pub intermediates: Option<PathBuf>,
    pub zones: Vec<ZoneCount>,
}

impl PipelineOutputs {
    fn planned(config: &PipelineConfig) -> Self {
        let base = config.basename();
        let out = |suffix: &str| config.output_dir.join(format!("{base}_{suffix}"));
        let classified = out("Classified.tif");
        Self {
            broad_bpi: out("BPI_broad.tif"),
            broad_std_bpi: out("stdBPI_broad.tif"),
            fine_bpi: out("BPI_fine.tif"),
            fine_std_bpi: out("stdBPI_fine.tif"),
            slope: out("Slope.tif"),
            zone_table: classified.with_extension("zones.csv"),
            classified,
            vrm: config.vrm_neighborhood.map(|n| out(&format!("VRM_{n}.tif"))),
            intermediates: None,
            zones: Vec::new(),
        }
    }
}

/// File name for a class mask; characters unsafe in paths become `_`.
fn mask_file_name(zone: &str) -> String {
    let safe: String = zone
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("con_{safe}.tif")
}

fn scale_bpi(
    engine: &RasterEngine,
    bathy: &Raster<f64>,
    scale: BpiScale,
    raw: &Path,
    standardised: &Path,
) -> Result<Raster<i32>> {
    let raw_bpi = bpi(bathy, scale.inner_radius, scale.outer_radius)?;
    engine.save(&raw_bpi, raw)?;
    let std_bpi = stdbpi(&raw_bpi)?;
    engine.save(&std_bpi, standardised)?;
    Ok(std_bpi)
}

/// Run the whole classification. Scratch space is removed on every exit
/// path unless intermediates are kept after a successful run.
pub fn run(config: &PipelineConfig) -> Result<PipelineOutputs> {
    config.validate()?;
    let engine = RasterEngine::new(config.engine.clone());
    let scratch = engine.scratch()?;
    let mut outputs = PipelineOutputs::planned(config);

    let rules = read_classification_table(&config.classification_table)?;
    if rules.is_empty() {
        return Err(Error::NoValidClasses);
    }
    std::fs::create_dir_all(&config.output_dir)?;
    let bathy: Raster<f64> = engine.load(&config.bathymetry)?;
    info!(rows = bathy.rows(), cols = bathy.cols(), rules = rules.len(), "loaded bathymetry");

    let (broad, fine) = (config.broad, config.fine);
    info!(inner = broad.inner_radius, outer = broad.outer_radius, "Calculating broad BPI");
    let broad_std =
        scale_bpi(&engine, &bathy, broad, &outputs.broad_bpi, &outputs.broad_std_bpi)?;

    info!(inner = fine.inner_radius, outer = fine.outer_radius, "Calculating fine BPI");
    let fine_std = scale_bpi(&engine, &bathy, fine, &outputs.fine_bpi, &outputs.fine_std_bpi)?;

    info!("Calculating slope");
    let slope = surface::slope(&bathy, 1.0)?;
    engine.save(&slope, &outputs.slope)?;

    info!("Classifying zones");
    let keep = config.engine.keep_intermediates;
    let classifier = Classifier::new(&bathy, &slope, &fine_std, &broad_std)?;
    let zones = classifier.classify_inspect(&rules, |rule, mask| {
        if keep {
            engine.save(mask, &scratch.file(&mask_file_name(&rule.zone_name)))?;
        }
        Ok(())
    })?;
    engine.save(&zones.raster, &outputs.classified)?;
    outputs.zones = zones.zone_table();
    write_zone_table(BufWriter::new(File::create(&outputs.zone_table)?), &outputs.zones)?;

    if let (Some(size), Some(path)) = (config.vrm_neighborhood, outputs.vrm.as_ref()) {
        info!(neighborhood_size = size, "Calculating VRM");
        let aspect = surface::aspect(&bathy)?;
        let rug = vrm(&slope, &aspect, size)?;
        engine.save(&rug, path)?;
    }

    if keep {
        outputs.intermediates = Some(scratch.keep());
    } else {
        scratch.close()?;
    }
    info!(classified = %outputs.classified.display(), "classification complete");
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::read_raster;
    use crate::raster::GeoInfo;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    const TABLE: &str = "\
Class,Zone,Depth_LowerBounds,Depth_UpperBounds,Slope_LowerBounds,Slope_UpperBounds,LSB_LowerBounds,LSB_UpperBounds,SSB_LowerBounds,SSB_UpperBounds
1,Shelf/Basin,,0,,,,,,
2,Never,5,,,,,,,
";

    fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
        let mut rng = StdRng::seed_from_u64(3);
        let depths = Array2::from_shape_fn((24, 24), |_| rng.gen_range(-80.0..-20.0));
        let bathy = Raster::from_array(depths)
            .with_geo(GeoInfo::with_cell_size(20.0, 20.0));
        let bathy_path = dir.join("SoG_20m.tif");
        RasterEngine::default().save(&bathy, &bathy_path).unwrap();
        let table_path = dir.join("bathy_classification.csv");
        std::fs::write(&table_path, TABLE).unwrap();
        (bathy_path, table_path)
    }

    fn small_config(dir: &Path) -> PipelineConfig {
        let (bathy, table) = write_inputs(dir);
        let mut config = PipelineConfig::new(bathy, dir.join("out"), table);
        config.broad = BpiScale { inner_radius: 2, outer_radius: 5 };
        config.fine = BpiScale { inner_radius: 1, outer_radius: 2 };
        config
    }

    #[test]
    fn writes_every_output() {
        let dir = TempDir::new().unwrap();
        let mut config = small_config(dir.path());
        config.vrm_neighborhood = Some(3);
        config.engine.keep_intermediates = true;

        let outputs = run(&config).unwrap();
        for path in [
            &outputs.broad_bpi,
            &outputs.broad_std_bpi,
            &outputs.fine_bpi,
            &outputs.fine_std_bpi,
            &outputs.slope,
            &outputs.classified,
            &outputs.zone_table,
        ] {
            assert!(path.exists(), "{}", path.display());
        }
        assert_eq!(outputs.classified, dir.path().join("out/SoG_20m_Classified.tif"));
        assert_eq!(outputs.zone_table, dir.path().join("out/SoG_20m_Classified.zones.csv"));
        assert!(outputs.vrm.as_ref().unwrap().exists());

        let scratch = outputs.intermediates.unwrap();
        assert!(scratch.join("con_Shelf_Basin.tif").exists());
        assert!(!scratch.join("con_Never.tif").exists());
        std::fs::remove_dir_all(scratch).unwrap();

        // every cell is shallower than 0 so rule 1 claims the whole grid
        let classified: Raster<i32> = read_raster(&outputs.classified).unwrap();
        assert!(classified.valid_values().all(|v| v == 1));
        let shelf = ZoneCount { value: 1, zone: "Shelf/Basin".into(), count: 24 * 24 };
        assert_eq!(outputs.zones, vec![shelf]);
        let csv = std::fs::read_to_string(&outputs.zone_table).unwrap();
        assert!(csv.starts_with("Value,Zone,Count\n1,Shelf/Basin,576"));
    }

    #[test]
    fn scratch_removed_on_failure() {
        let dir = TempDir::new().unwrap();
        let mut config = small_config(dir.path());
        let scratch_parent = dir.path().join("scratch");
        config.engine.scratch_dir = Some(scratch_parent.clone());
        config.classification_table = dir.path().join("missing.csv");

        assert!(matches!(run(&config), Err(Error::Io(_))));
        assert_eq!(std::fs::read_dir(&scratch_parent).unwrap().count(), 0);
    }

    #[test]
    fn rejects_bad_radii_up_front() {
        let dir = TempDir::new().unwrap();
        let mut config = small_config(dir.path());
        config.fine = BpiScale { inner_radius: 4, outer_radius: 2 };
        assert!(matches!(run(&config), Err(Error::InvalidParameter { .. })));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn config_defaults() {
        let json = r#"{
            "bathymetry": "Bathy/SoG_20m.tif",
            "output_dir": "Derivatives",
            "classification_table": "Classify/bathy_classification.csv",
            "engine": { "compression": "deflate" }
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.broad, BpiScale::BROAD);
        assert_eq!(config.fine, BpiScale::FINE);
        assert_eq!(config.basename(), "SoG_20m");
        assert_eq!(config.engine.compression, crate::engine::Compression::Deflate);
        assert!(config.engine.compute_statistics);
    }

    #[test]
    fn mask_names_are_path_safe() {
        assert_eq!(mask_file_name("Shelf/Basin"), "con_Shelf_Basin.tif");
        assert_eq!(mask_file_name("Crest"), "con_Crest.tif");
    }
}
