//! Cache-specific error types
//!
//! None of these are fatal to a search. The walker and the archive lister log
//! them and fall back to scanning the filesystem or the archive again.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Represents a sled database error
    #[error("Cache store error: {0}")]
    SledError(#[from] sled::Error),

    /// Represents a bincode decoding error
    #[error("Error while decoding cache entry: {0}")]
    DecodeError(#[from] bincode::error::DecodeError),

    /// Represents a bincode encoding error
    #[error("Error while encoding cache entry: {0}")]
    EncodeError(#[from] bincode::error::EncodeError),

    /// A stored row that cannot be turned back into a record
    #[error("Invalid cache row: {0}")]
    InvalidRow(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
