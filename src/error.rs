//! Error taxonomy for the sextant engine.
//!
//! Three recoverable categories cross the API boundary: a referenced entity
//! key that is absent from the current snapshot, a malformed or out-of-range
//! request parameter, and an underlying persistence failure. Storage errors
//! during ingest abort that indexing run without touching the served
//! snapshot.

use thiserror::Error;

/// All errors produced by the sextant library.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced entity key is not present in the current snapshot.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// A request parameter was malformed, non-numeric, or out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The persistence substrate failed during build or load.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Stable machine-readable tag for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::InvalidParameter(_) => "invalid_parameter",
            Error::Storage(_) => "storage",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
