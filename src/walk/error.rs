//! Walk-time error types
//!
//! Every failure met while walking is a [`FindError`] carrying the path it
//! happened at. None of them end a walk by themselves: the walker hands each
//! one to the error handler in `WalkParams` and keeps going unless the handler
//! answers `ControlFlow::Break`.
//!
//! # Error Types
//!
//! - **`PermissionDenied`**: a directory or file could not be read; that subtree is skipped
//! - **`Io`**: any other stat/readdir failure
//! - **`Archive`**: an archive could not be listed (unsupported, corrupt, encrypted)
//! - **`Eval`**: the filter failed on one record (unknown symbol, type mismatch)

use crate::archive::ArchiveError;
use crate::filter::EvalError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FindError {
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("Filter error on {}: {source}", path.display())]
    Eval {
        path: PathBuf,
        #[source]
        source: EvalError,
    },
}

impl FindError {
    /// Classify an I/O failure, splitting out permission errors
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::Io { path, source }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied { path }
            | Self::Io { path, .. }
            | Self::Archive { path, .. }
            | Self::Eval { path, .. } => path,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
