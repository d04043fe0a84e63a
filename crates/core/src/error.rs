//! Error types for gauss-grid.

use thiserror::Error;

/// Errors produced by grid generation, measurement and persistence.
#[derive(Debug, Error)]
pub enum GridError {
    /// A box size, grid size, bin width, power value or config entry was invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A data buffer did not hold `N³` samples for the declared grid size.
    #[error("dimension mismatch: expected {expected} samples, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Spectra with different box sizes or shell layouts cannot be combined.
    #[error("incompatible binning: {0}")]
    IncompatibleBinning(String),

    /// A spectrum model name was not recognized by the registry.
    #[error("unknown spectrum model: {0}")]
    UnknownSpectrum(String),

    /// Writing or reading a persisted artifact failed.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl GridError {
    /// Shorthand for [`GridError::InvalidParameter`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        GridError::InvalidParameter(msg.into())
    }
}

impl From<std::io::Error> for GridError {
    fn from(e: std::io::Error) -> Self {
        GridError::Persistence(e.to_string())
    }
}
