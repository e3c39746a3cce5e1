use anyhow::Result;
use ndarray::Array2;
use benthic_terrain::algebra::statistics;
use benthic_terrain::{acr, aspect, slope, vrm, GeoInfo, Raster};

fn main() -> Result<()> {
    // smooth slope on the left half, boulder field on the right
    let bathy = Raster::from_array(Array2::from_shape_fn((40, 40), |(r, c)| {
        let base = -60.0 - 0.5 * c as f64;
        if c < 20 {
            base
        } else {
            base + 3.0 * ((r as f64 * 1.3).sin() * (c as f64 * 0.9).cos())
        }
    }))
    .with_geo(GeoInfo::with_cell_size(5.0, 5.0));

    let slope = slope(&bathy, 1.0)?;
    let aspect = aspect(&bathy)?;
    for size in [3, 5, 9] {
        let rug = vrm(&slope, &aspect, size)?;
        let left = rug.get(20, 8).unwrap_or(f64::NAN);
        let right = rug.get(20, 30).unwrap_or(f64::NAN);
        let mean = statistics(&rug).map(|s| s.mean).unwrap_or(f64::NAN);
        println!("VRM {size}x{size}: smooth {left:.5}  rough {right:.5}  mean {mean:.5}");
    }

    let result = acr(&bathy)?;
    println!(
        "ACR rugosity {:.4} (plane slope {:.2} deg, aspect {:.1} deg)",
        result.rugosity, result.slope, result.aspect
    );
    Ok(())
}
