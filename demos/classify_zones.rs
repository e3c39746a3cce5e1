use anyhow::Result;
use ndarray::Array2;
use benthic_terrain::table::parse_classification_table;
use benthic_terrain::{bpi, classify, slope, stdbpi, GeoInfo, Raster};

const TABLE: &str = "\
Class,Zone,Depth_LowerBounds,Depth_UpperBounds,Slope_LowerBounds,Slope_UpperBounds,LSB_LowerBounds,LSB_UpperBounds,SSB_LowerBounds,SSB_UpperBounds
1,Depression,,,,,,,,-100
2,Crest,,,,,,,100,
3,Steep Slope,,,10,,,,-100,100
4,Flat,,,,10,,,-100,100
";

fn main() -> Result<()> {
    // a ridge running north-south with a pit to the east of it
    let bathy = Raster::from_array(Array2::from_shape_fn((60, 60), |(r, c)| {
        let ridge = 30.0 * (-((c as f64 - 20.0).powi(2)) / 40.0).exp();
        let (dr, dc) = (r as f64 - 30.0, c as f64 - 42.0);
        let pit = -40.0 * (-(dr * dr + dc * dc) / 30.0).exp();
        -120.0 + ridge + pit
    }))
    .with_geo(GeoInfo::with_cell_size(10.0, 10.0));

    let broad = stdbpi(&bpi(&bathy, 4, 10)?)?;
    let fine = stdbpi(&bpi(&bathy, 1, 4)?)?;
    let slope = slope(&bathy, 1.0)?;

    let rules = parse_classification_table(TABLE.as_bytes())?;
    let zones = classify(&rules, &bathy, &slope, &fine, &broad)?;

    println!("{:>6}  {:<16} {}", "Value", "Zone", "Count");
    for row in zones.zone_table() {
        println!("{:>6}  {:<16} {}", row.value, row.zone, row.count);
    }
    println!("ridge top: {:?}", zones.zone_at(30, 20));
    println!("pit floor: {:?}", zones.zone_at(30, 42));
    Ok(())
}
