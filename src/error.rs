//! Error taxonomy for the search core.

use thiserror::Error;

/// Errors raised by the cache, the algorithm modules and the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// A slot reaches past the end of its cache. Programming error.
    #[error("slot {start}..{end} is out of bounds for a cache of {capacity} bytes")]
    OutOfBounds {
        start: usize,
        end: usize,
        capacity: usize,
    },

    /// A buffer or request length does not fit the slot or pool.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The candidate is zero or not below the curve order.
    #[error("scalar is not a valid secp256k1 private key")]
    InvalidScalar,

    /// A deterministic search walked past the end of its range.
    #[error("search range exhausted")]
    RangeExhausted,

    #[error("malformed range: {0}")]
    MalformedRange(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl SearchError {
    /// Returns true if the error must terminate the worker rather than the job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SearchError::OutOfBounds { .. })
    }
}

impl From<hex::FromHexError> for SearchError {
    fn from(err: hex::FromHexError) -> Self {
        SearchError::InvalidHex(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
