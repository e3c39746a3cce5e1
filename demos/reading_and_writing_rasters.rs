use anyhow::Result;
use tempfile::NamedTempFile;
use std::path::PathBuf;
use ndarray::array;
use benthic_terrain::{read_raster, write_raster, GeoInfo, Raster, INT_NODATA};
use benthic_terrain::engine::Compression;

fn main() -> Result<()> {
    let zones = Raster::new(
        array![
            [0, 3, 3, 7],
            [1, 4, INT_NODATA, 2],
            [5, 6, 8, 0],
        ],
        INT_NODATA,
    );
    let geo = GeoInfo {
        transform: [1361171.0, 8.0, 0.0, 5006315.0, 0.0, -8.0],
        geokeys: vec![
            1, 1, 0, 4, 1024, 0, 1, 1, 1025, 0, 1, 1, 1026, 34737, 48, 0, 3072, 0, 1, 2193,
        ],
        ascii_params: "NZGD2000 / New Zealand Transverse Mercator 2000|NZGD2000|".to_string(),
    };
    let zones = zones.with_geo(geo);

    let tmp = NamedTempFile::new()?;
    let ofn: PathBuf = tmp.path().to_path_buf();
    println!("Writing raster to {:?}", ofn);
    write_raster(&zones, &ofn, Compression::Lzw)?;

    // read file back in
    println!("Reading {:?} into a new raster and checking got same values", ofn);
    let zones_new: Raster<i32> = read_raster(&ofn)?;

    assert_eq!(zones_new.shape(), zones.shape());
    assert_eq!(zones_new.data(), zones.data());
    assert_eq!(zones_new.nodata(), INT_NODATA);
    assert_eq!(zones_new.geo(), zones.geo());
    assert_eq!(zones_new.geo().epsg(), Some(2193));

    tmp.close()?;
    Ok(())
}
