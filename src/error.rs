//! Error types for benthic-terrain

use thiserror::Error;

/// Errors raised while deriving or classifying bathymetric rasters
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("no valid output classes found")]
    NoValidClasses,

    #[error("raster engine failure: {0}")]
    EngineFailure(String),

    #[error("raster size mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("classification table error: {0}")]
    Table(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for benthic-terrain operations
pub type Result<T> = std::result::Result<T, Error>;
