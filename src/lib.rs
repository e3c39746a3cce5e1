//! # Benthic-terrain
//!
//! `benthic-terrain` derives terrain descriptors from bathymetry and sorts the seafloor into
//! benthic zones, in the manner of the Benthic Terrain Modeler.  It provides
//!
//! * bathymetric position index (BPI) at broad and fine scales, and its standardised form
//! * vector ruggedness measure (VRM) and arc-chord ratio (ACR) rugosity
//! * slope and aspect
//! * rule table classification of the above into named zones
//!
//! Rasters are held in memory as [`Raster`] values (an ndarray `Array2` plus a no-data value and
//! georeferencing) and read from / written to GeoTIFF by the [`engine`].  The whole chain, from a
//! bathymetry file to a classified raster, is in [`pipeline`].
//!
//! ## Example
//!
//! ```
//! use ndarray::Array2;
//! use benthic_terrain::{bpi, stdbpi, classify, slope, ClassificationRule, Raster};
//!
//! // a round hollow, 100 m deep in the middle
//! let bathy = Raster::from_array(Array2::from_shape_fn((21, 21), |(r, c)| {
//!     let (dr, dc) = (r as f64 - 10.0, c as f64 - 10.0);
//!     -100.0 * (-(dr * dr + dc * dc) / 30.0).exp()
//! }));
//!
//! let broad = stdbpi(&bpi(&bathy, 3, 6).unwrap()).unwrap();
//! let fine = stdbpi(&bpi(&bathy, 1, 3).unwrap()).unwrap();
//! let slope = slope(&bathy, 1.0).unwrap();
//!
//! let rules = vec![
//!     ClassificationRule::new(1, "Depression").with_broad_bpi(None, Some(-100.0)),
//!     ClassificationRule::new(2, "Deep").with_depth(None, Some(-90.0)),
//! ];
//! let zones = classify(&rules, &bathy, &slope, &fine, &broad).unwrap();
//! assert_eq!(zones.zone_at(10, 10), Some("Depression"));
//! ```

pub mod algebra;
pub mod bpi;
pub mod classify;
pub mod engine;
pub mod error;
pub mod focal;
pub mod neighborhood;
pub mod pipeline;
pub mod predicate;
pub mod raster;
pub mod ruggedness;
pub mod rugosity;
pub mod surface;
pub mod table;

pub use bpi::{bpi, stdbpi};
pub use classify::{classify, ClassificationRule, ZoneKey, ZoneRaster};
pub use engine::{read_raster, write_raster, EngineConfig, RasterEngine};
pub use error::{Error, Result};
pub use neighborhood::Neighborhood;
pub use predicate::Range;
pub use raster::{GeoInfo, Raster, RasterElement, INT_NODATA};
pub use ruggedness::vrm;
pub use rugosity::acr;
pub use surface::{aspect, slope};
