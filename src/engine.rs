//! Raster persistence and per-run resources.
//!
//! [`RasterEngine`] owns the settings that govern how rasters are written
//! (compression, statistics sidecars, scratch location). They are fixed when
//! the engine is built and passed nowhere else.
//!
//! GeoTIFFs are read with the `tiff` crate. Pixel scale, tiepoint (or model
//! transformation), GeoKey directory, GeoAscii parameters and `GDAL_NODATA`
//! are carried through; rasters are always written as 32-bit float.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression as TiffCompression, Deflate, Lzw, Uncompressed};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::{debug, info};

use crate::algebra::statistics;
use crate::error::{Error, Result};
use crate::raster::{GeoInfo, Raster, RasterElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Lzw,
    Deflate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub compression: Compression,
    /// Write a `<raster>.stats.json` sidecar next to every saved raster.
    pub compute_statistics: bool,
    /// Parent directory for scratch space. The system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    /// Save intermediate rasters (per-class masks) into scratch space.
    pub keep_intermediates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Lzw,
            compute_statistics: true,
            scratch_dir: None,
            keep_intermediates: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RasterEngine {
    config: EngineConfig,
}

impl RasterEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn load<T: RasterElement>(&self, path: &Path) -> Result<Raster<T>> {
        debug!(path = %path.display(), "loading raster");
        read_raster(path)
    }

    /// Write `raster` to `path`, plus the statistics sidecar if configured.
    pub fn save<T: RasterElement>(&self, raster: &Raster<T>, path: &Path) -> Result<()> {
        info!(path = %path.display(), "saving raster");
        write_raster(raster, path, self.config.compression)?;
        if self.config.compute_statistics {
            if let Some(stats) = statistics(raster) {
                let file = File::create(stats_path(path))?;
                serde_json::to_writer_pretty(BufWriter::new(file), &stats)?;
            }
        }
        Ok(())
    }

    /// Fresh scratch space for one run, removed when dropped.
    pub fn scratch(&self) -> Result<ScratchSpace> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("benthic-");
        let dir = match &self.config.scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "scratch space");
        Ok(ScratchSpace { dir })
    }
}

/// Path of the statistics sidecar for `path`.
pub fn stats_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".stats.json");
    path.with_file_name(name)
}

/// Scratch directory owned by a single run. Deleted on drop, so early
/// returns and errors clean up too.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a scratch file called `name`.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Keep the directory on disk and return its path.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Remove the directory now, reporting any failure.
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}

/// Read a single band GeoTIFF.
///
/// Values that do not fit `T` become no-data. Without a `GDAL_NODATA` tag the
/// no-data value is NaN for float rasters and the type minimum otherwise.
pub fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let geo = read_geo(&mut decoder)?;
    let nodata_tag = decoder
        .find_tag(Tag::GdalNodata)?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());
    let nodata: T = nodata_tag
        .and_then(<T as num::NumCast>::from)
        .or_else(|| <T as num::NumCast>::from(f64::NAN))
        .unwrap_or_else(T::min_value);

    let values: Vec<f64> = match decoder.read_image()? {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::EngineFailure(format!(
                "{}: unsupported pixel format",
                path.display()
            )))
        }
    };
    if values.len() != rows * cols {
        return Err(Error::EngineFailure(format!(
            "{}: expected {} cells, decoded {} (multi-band rasters are not supported)",
            path.display(),
            rows * cols,
            values.len()
        )));
    }

    let nodata_f64 = nodata.to_f64();
    let data: Vec<T> = values
        .into_iter()
        .map(|v| {
            if Some(v) == nodata_f64 {
                nodata
            } else {
                <T as num::NumCast>::from(v).unwrap_or(nodata)
            }
        })
        .collect();
    let array = ndarray::Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::EngineFailure(e.to_string()))?;
    Ok(Raster::new(array, nodata).with_geo(geo))
}

fn read_geo<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoInfo> {
    let mut geo = GeoInfo::default();

    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?.map(|v| v.into_f64_vec()).transpose()?;
    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag)?.map(|v| v.into_f64_vec()).transpose()?;
    let matrix = decoder
        .find_tag(Tag::ModelTransformationTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;

    match (scale, tiepoint, matrix) {
        (Some(s), Some(t), _) if s.len() >= 2 && t.len() >= 6 => {
            // tiepoint: [I, J, K, X, Y, Z]
            let origin_x = t[3] - t[0] * s[0];
            let origin_y = t[4] + t[1] * s[1];
            geo.transform = [origin_x, s[0], 0.0, origin_y, 0.0, -s[1]];
        }
        (_, _, Some(m)) if m.len() >= 8 => {
            geo.transform = [m[3], m[0], m[1], m[7], m[4], m[5]];
        }
        _ => {}
    }

    if let Some(keys) = decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        geo.geokeys = keys.into_u16_vec()?;
    }
    if let Some(ascii) = decoder.find_tag(Tag::GeoAsciiParamsTag)? {
        geo.ascii_params = ascii.into_string()?.trim_end_matches(char::from(0)).to_string();
    }
    Ok(geo)
}

/// Write `raster` as a 32-bit float GeoTIFF.
pub fn write_raster<T: RasterElement>(
    raster: &Raster<T>,
    path: &Path,
    compression: Compression,
) -> Result<()> {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    match compression {
        Compression::None => encode(&mut encoder, raster, Uncompressed),
        Compression::Lzw => encode(&mut encoder, raster, Lzw),
        Compression::Deflate => encode(&mut encoder, raster, Deflate::default()),
    }
}

fn encode<T, W, D>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, compression: D) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
    D: TiffCompression,
{
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata().to_f32().unwrap_or(f32::NAN);
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| if raster.is_nodata(v) { nodata } else { v.to_f32().unwrap_or(nodata) })
        .collect();

    let (width, height) = (cols as u32, rows as u32);
    let mut image =
        encoder.new_image_with_compression::<Gray32Float, D>(width, height, compression)?;

    let geo = raster.geo();
    let t = geo.transform;
    let scale = [t[1], t[5].abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, t[0], t[3], 0.0];
    image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
    image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    if geo.geokeys.is_empty() {
        // GTModelTypeGeoKey = projected, GTRasterTypeGeoKey = pixel is area
        let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
        image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;
    } else {
        image.encoder().write_tag(Tag::GeoKeyDirectoryTag, geo.geokeys.as_slice())?;
    }
    if !geo.ascii_params.is_empty() {
        image.encoder().write_tag(Tag::GeoAsciiParamsTag, geo.ascii_params.as_str())?;
    }
    let nodata_text = f64::from(nodata).to_string();
    image.encoder().write_tag(Tag::GdalNodata, nodata_text.as_str())?;

    image.write_data(&data)?;
    Ok(())
}
