//! Archive listing
//!
//! The walker never parses containers itself. It asks an [`ArchiveRegistry`]
//! for the reader registered for a format and calls [`ArchiveReader::list`].
//! Readers for 7z and rar are behind the `sevenz` and `rar` features; without
//! them the registry answers with [`ArchiveError::Unsupported`] for those
//! formats instead of failing the search.

pub mod error;
pub mod listing;
#[cfg(feature = "rar")]
mod rar;
pub mod selection;
#[cfg(feature = "sevenz")]
mod sevenz;
mod tar;
mod zip;

pub use error::ArchiveError;
pub use listing::ArchiveLister;
pub use selection::{ArchiveSelection, SelectionStrategy};

use crate::record::FileType;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Suffixes treated as archives when classifying names. Broader than the set
/// of listable formats: a bare `.gz` is an archive but has no member listing.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".zip", ".tar", ".gz", ".bz2", ".xz", ".7z", ".rar", ".tgz", ".tbz2", ".txz",
];

/// Whether a file name looks like an archive
#[must_use]
pub fn is_archive(name: &str) -> bool {
    let lower = name.to_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Container formats that can be listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    SevenZip,
    Rar,
}

impl ArchiveFormat {
    pub const ALL: [Self; 7] = [
        Self::Zip,
        Self::Tar,
        Self::TarGz,
        Self::TarBz2,
        Self::TarXz,
        Self::SevenZip,
        Self::Rar,
    ];

    /// Detect the format from the file name suffix
    #[must_use]
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        let format = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Self::TarBz2
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Self::TarXz
        } else if name.ends_with(".tar") {
            Self::Tar
        } else if name.ends_with(".zip") {
            Self::Zip
        } else if name.ends_with(".7z") {
            Self::SevenZip
        } else if name.ends_with(".rar") {
            Self::Rar
        } else {
            return None;
        };
        Some(format)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarBz2 => "tar.bz2",
            Self::TarXz => "tar.xz",
            Self::SevenZip => "7z",
            Self::Rar => "rar",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry as reported by a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    /// Base name
    pub name: String,
    /// Path inside the archive, without a trailing slash
    pub path: String,
    /// Uncompressed size
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub file_type: FileType,
}

impl MemberEntry {
    /// Build an entry from a raw in-archive path. A trailing `/` marks a
    /// directory in zip listings and is stripped here.
    #[must_use]
    pub fn from_raw_path(raw: &str, size: u64, mtime: DateTime<Utc>, file_type: FileType) -> Self {
        let path = raw.trim_end_matches('/').to_string();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            name,
            path,
            size,
            mtime,
            file_type,
        }
    }
}

/// Lists the members of one archive format
pub trait ArchiveReader: Send + Sync {
    /// List every member in the archive's own order.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError` when the file cannot be read or is not a valid
    /// archive of this format.
    fn list(&self, path: &Path) -> Result<Vec<MemberEntry>, ArchiveError>;
}

/// Stand-in for formats whose reader is not compiled in
#[derive(Debug, Clone, Copy)]
pub struct UnavailableReader(pub ArchiveFormat);

impl ArchiveReader for UnavailableReader {
    fn list(&self, _path: &Path) -> Result<Vec<MemberEntry>, ArchiveError> {
        Err(ArchiveError::Unsupported(self.0.to_string()))
    }
}

/// Format -> reader table, built once and shared by all workers
#[derive(Clone)]
pub struct ArchiveRegistry {
    readers: HashMap<ArchiveFormat, Arc<dyn ArchiveReader>>,
}

impl fmt::Debug for ArchiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&str> = self.readers.keys().map(|f| f.as_str()).collect();
        formats.sort_unstable();
        f.debug_struct("ArchiveRegistry")
            .field("formats", &formats)
            .finish()
    }
}

impl Default for ArchiveRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ArchiveFormat::Zip, Arc::new(zip::ZipReader));
        for (format, compression) in [
            (ArchiveFormat::Tar, tar::Compression::None),
            (ArchiveFormat::TarGz, tar::Compression::Gzip),
            (ArchiveFormat::TarBz2, tar::Compression::Bzip2),
            (ArchiveFormat::TarXz, tar::Compression::Xz),
        ] {
            registry.register(format, Arc::new(tar::TarReader::new(compression)));
        }

        #[cfg(feature = "sevenz")]
        registry.register(ArchiveFormat::SevenZip, Arc::new(sevenz::SevenZipReader));
        #[cfg(not(feature = "sevenz"))]
        registry.register(
            ArchiveFormat::SevenZip,
            Arc::new(UnavailableReader(ArchiveFormat::SevenZip)),
        );

        #[cfg(feature = "rar")]
        registry.register(ArchiveFormat::Rar, Arc::new(rar::RarReader));
        #[cfg(not(feature = "rar"))]
        registry.register(ArchiveFormat::Rar, Arc::new(UnavailableReader(ArchiveFormat::Rar)));

        registry
    }
}

impl ArchiveRegistry {
    /// Registry with no readers at all
    #[must_use]
    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Add or replace the reader for a format
    pub fn register(&mut self, format: ArchiveFormat, reader: Arc<dyn ArchiveReader>) {
        self.readers.insert(format, reader);
    }

    #[must_use]
    pub fn reader_for(&self, path: &Path) -> Option<(ArchiveFormat, Arc<dyn ArchiveReader>)> {
        let format = ArchiveFormat::detect(path)?;
        self.readers
            .get(&format)
            .map(|reader| (format, Arc::clone(reader)))
    }

    /// Whether the walker should try to list this file
    #[must_use]
    pub fn is_listable(&self, path: &Path) -> bool {
        ArchiveFormat::detect(path).is_some()
    }

    /// List an archive with the reader registered for its format.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Unsupported` when no reader is registered, or the
    /// reader's own error.
    pub fn list(&self, path: &Path) -> Result<Vec<MemberEntry>, ArchiveError> {
        let (format, reader) = self.reader_for(path).ok_or_else(|| {
            ArchiveError::Unsupported(
                ArchiveFormat::detect(path).map_or_else(|| path.display().to_string(), |f| f.to_string()),
            )
        })?;
        tracing::trace!(path = %path.display(), %format, "listing archive");
        reader.list(path)
    }
}

/// Convert a file's modification time, falling back to the epoch for
/// platforms that cannot report it
pub(crate) fn system_time_to_utc(time: std::io::Result<std::time::SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from).unwrap_or_default()
}
