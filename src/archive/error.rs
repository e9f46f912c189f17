use std::io;
use thiserror::Error;

/// Errors raised while listing an archive
///
/// Every variant is local to one archive. The walker reports it and moves on.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No reader for this format, or its optional feature is not compiled in
    #[error("Unsupported archive format: {0}")]
    Unsupported(String),

    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    #[error("Archive is encrypted and needs a password")]
    PasswordRequired,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
