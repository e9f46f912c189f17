//! Stored cache entities
//!
//! Every value written to the cache store is one of the types below, encoded
//! with bincode. Records are stored as fixed tuples rather than field maps and
//! timestamps keep their nanoseconds, so a record read back is identical to the
//! record written.

use super::error::CacheError;
use crate::record::{FileInfo, FileType};
use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Wrapper for `PathBuf` that can be converted to `Vec<u8>` for store keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKey(pub PathBuf);

impl TryFrom<PathKey> for Vec<u8> {
    type Error = CacheError;

    fn try_from(key: PathKey) -> Result<Self, Self::Error> {
        Ok(bincode::encode_to_vec(&key.0, bincode::config::standard())?)
    }
}

impl PathKey {
    /// Key for a path, made absolute so relative and absolute spellings of the
    /// same location share one entry
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self(std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
    }

    /// # Errors
    ///
    /// Returns `CacheError` if the bytes cannot be deserialized into a `PathBuf`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        let (path, _): (PathBuf, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(Self(path))
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// A timestamp split into whole seconds and nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Stamp {
    pub secs: i64,
    pub nanos: u32,
}

impl From<DateTime<Utc>> for Stamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            secs: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }
}

impl TryFrom<Stamp> for DateTime<Utc> {
    type Error = CacheError;

    fn try_from(stamp: Stamp) -> Result<Self, Self::Error> {
        Self::from_timestamp(stamp.secs, stamp.nanos).ok_or_else(|| {
            CacheError::InvalidRow(format!("timestamp {}.{}", stamp.secs, stamp.nanos))
        })
    }
}

/// One record: `(name, path, size, mtime, type, archive)`
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RecordRow(pub String, pub String, pub u64, pub Stamp, pub u8, pub String);

impl From<&FileInfo> for RecordRow {
    fn from(info: &FileInfo) -> Self {
        Self(
            info.name.clone(),
            info.path.clone(),
            info.size,
            info.mod_time.into(),
            info.file_type.code(),
            info.archive.clone(),
        )
    }
}

impl TryFrom<RecordRow> for FileInfo {
    type Error = CacheError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let RecordRow(name, path, size, stamp, code, archive) = row;
        let file_type = FileType::from_code(code)
            .ok_or_else(|| CacheError::InvalidRow(format!("file type {code}")))?;
        Ok(Self {
            name,
            path,
            size,
            mod_time: stamp.try_into()?,
            file_type,
            archive,
        })
    }
}

/// Cached listing of one archive
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ArchiveIndex {
    pub archive_path: String,
    pub archive_mtime: Stamp,
    pub archive_size: u64,
    pub checksum: String,
    /// Members in the archive's own listing order; `archive` is the archive path
    pub members: Vec<RecordRow>,
    pub scanned_at: i64,
}

impl ArchiveIndex {
    /// # Errors
    ///
    /// Returns `CacheError::InvalidRow` if a stored row is malformed.
    pub fn records(&self) -> Result<Vec<FileInfo>, CacheError> {
        self.members.iter().cloned().map(FileInfo::try_from).collect()
    }
}

/// What produced a result snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct QueryMetadata {
    /// Filter in text form
    pub filter: String,
    pub roots: Vec<String>,
    pub archives_only: bool,
    pub no_archive: bool,
}

/// A saved search result
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ResultSnapshot {
    pub version: u32,
    pub created_at: i64,
    pub metadata: QueryMetadata,
    pub rows: Vec<RecordRow>,
}

impl ResultSnapshot {
    #[must_use]
    pub fn new(version: u32, metadata: QueryMetadata, records: &[FileInfo]) -> Self {
        Self {
            version,
            created_at: Utc::now().timestamp(),
            metadata,
            rows: records.iter().map(RecordRow::from).collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `CacheError::InvalidRow` if a stored row is malformed.
    pub fn records(&self) -> Result<Vec<FileInfo>, CacheError> {
        self.rows.iter().cloned().map(FileInfo::try_from).collect()
    }
}

/// Summary of what the store holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub archives: usize,
    pub members: usize,
    pub archive_bytes: u64,
    pub directories: usize,
    pub has_results: bool,
}
