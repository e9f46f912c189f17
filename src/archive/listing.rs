//! Cache-backed archive listing
//!
//! [`ArchiveLister::list_entries`] turns an archive's members into records.
//! With a cache attached it first computes the archive checksum and reuses a
//! stored listing when the checksum still matches; otherwise it asks the
//! registry's reader and stores the fresh listing.

use super::{ArchiveError, ArchiveRegistry, MemberEntry, system_time_to_utc};
use crate::cache::{self, ArchiveIndex, CacheStore, RecordRow};
use crate::record::FileInfo;
use chrono::Utc;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ArchiveLister {
    registry: Arc<ArchiveRegistry>,
    cache: Option<Arc<CacheStore>>,
}

impl ArchiveLister {
    #[must_use]
    pub const fn new(registry: Arc<ArchiveRegistry>, cache: Option<Arc<CacheStore>>) -> Self {
        Self { registry, cache }
    }

    #[must_use]
    pub fn registry(&self) -> &ArchiveRegistry {
        &self.registry
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Members of the archive at `path` as records whose `archive` field is
    /// the archive's absolute path. Members keep the reader's order.
    ///
    /// Cache failures are logged and fall back to the reader.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError` if the archive cannot be stat'ed or listed.
    pub fn list_entries(&self, path: &Path) -> Result<Vec<FileInfo>, ArchiveError> {
        let absolute = std::path::absolute(path)?;
        let Some(cache) = &self.cache else {
            return self.scan(&absolute);
        };

        let metadata = fs::metadata(&absolute)?;
        let mtime = system_time_to_utc(metadata.modified());
        let sum = cache::checksum(&absolute, metadata.len(), mtime);

        match cache.archive_index(&absolute) {
            Ok(Some(index)) if index.checksum == sum => match index.records() {
                Ok(records) => {
                    tracing::trace!(path = %absolute.display(), "archive index hit");
                    return Ok(records);
                }
                Err(e) => tracing::warn!(path = %absolute.display(), error = %e, "unusable archive index"),
            },
            Ok(Some(_)) => tracing::debug!(path = %absolute.display(), "archive changed, rescanning"),
            Ok(None) => tracing::trace!(path = %absolute.display(), "archive index miss"),
            Err(e) => tracing::warn!(path = %absolute.display(), error = %e, "archive index read failed"),
        }

        let records = self.scan(&absolute)?;
        let index = ArchiveIndex {
            archive_path: absolute.to_string_lossy().into_owned(),
            archive_mtime: mtime.into(),
            archive_size: metadata.len(),
            checksum: sum,
            members: records.iter().map(RecordRow::from).collect(),
            scanned_at: Utc::now().timestamp(),
        };
        if let Err(e) = cache.store_archive_index(index) {
            tracing::warn!(path = %absolute.display(), error = %e, "failed to store archive index");
        }
        Ok(records)
    }

    fn scan(&self, absolute: &Path) -> Result<Vec<FileInfo>, ArchiveError> {
        let archive = absolute.to_string_lossy().into_owned();
        Ok(self
            .registry
            .list(absolute)?
            .into_iter()
            .map(|entry| member_record(entry, &archive))
            .collect())
    }
}

fn member_record(entry: MemberEntry, archive: &str) -> FileInfo {
    FileInfo {
        name: entry.name,
        path: entry.path,
        size: entry.size,
        mod_time: entry.mtime,
        file_type: entry.file_type,
        archive: archive.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveFormat, ArchiveReader};
    use crate::record::FileType;
    use crate::testing::{TempDir, TestCache, write_zip};
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingReader {
        calls: AtomicUsize,
    }

    impl ArchiveReader for CountingReader {
        fn list(&self, _path: &Path) -> Result<Vec<MemberEntry>, ArchiveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                MemberEntry::from_raw_path("docs/", 0, DateTime::default(), FileType::Dir),
                MemberEntry::from_raw_path("docs/a.txt", 3, DateTime::default(), FileType::File),
            ])
        }
    }

    fn counting_lister(cache: Option<Arc<CacheStore>>) -> (ArchiveLister, Arc<CountingReader>) {
        let reader = Arc::new(CountingReader::default());
        let mut registry = ArchiveRegistry::empty();
        registry.register(ArchiveFormat::Zip, reader.clone());
        (ArchiveLister::new(Arc::new(registry), cache), reader)
    }

    #[test]
    fn test_records_carry_absolute_archive_path() {
        let dir = TempDir::new();
        let path = dir.path().join("b.zip");
        write_zip(&path, &[("inner.jpg", 2048)]);

        let lister = ArchiveLister::new(Arc::new(ArchiveRegistry::default()), None);
        let records = lister.list_entries(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "inner.jpg");
        assert_eq!(records[0].size, 2048);
        assert_eq!(records[0].archive, std::path::absolute(&path).unwrap().to_string_lossy());
        assert!(Path::new(&records[0].archive).is_absolute());
    }

    #[test]
    fn test_cache_hit_skips_reader() {
        let dir = TempDir::new();
        let path = dir.path().join("a.zip");
        fs::write(&path, b"zip bytes").unwrap();
        let cache = TestCache::new();
        let (lister, reader) = counting_lister(Some(cache.store()));

        let first = lister.list_entries(&path).unwrap();
        let second = lister.list_entries(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second[0].file_type, FileType::Dir);
    }

    #[test]
    fn test_changed_archive_is_rescanned() {
        let dir = TempDir::new();
        let path = dir.path().join("a.zip");
        fs::write(&path, b"zip bytes").unwrap();
        let cache = TestCache::new();
        let (lister, reader) = counting_lister(Some(cache.store()));

        lister.list_entries(&path).unwrap();
        fs::write(&path, b"different and longer zip bytes").unwrap();
        lister.list_entries(&path).unwrap();
        assert_eq!(reader.calls.load(Ordering::SeqCst), 2);

        let stored = cache.archive_index(&path).unwrap().unwrap();
        assert_eq!(stored.archive_size, 30);
    }

    #[test]
    fn test_without_cache_always_reads() {
        let dir = TempDir::new();
        let path = dir.path().join("a.zip");
        fs::write(&path, b"zip").unwrap();
        let (lister, reader) = counting_lister(None);

        lister.list_entries(&path).unwrap();
        lister.list_entries(&path).unwrap();
        assert_eq!(reader.calls.load(Ordering::SeqCst), 2);
        assert!(!lister.is_cached());
    }

    #[test]
    fn test_reader_error_is_not_cached() {
        let dir = TempDir::new();
        let path = dir.path().join("broken.zip");
        fs::write(&path, b"not a zip").unwrap();
        let cache = TestCache::new();
        let lister = ArchiveLister::new(Arc::new(ArchiveRegistry::default()), Some(cache.store()));

        assert!(lister.list_entries(&path).is_err());
        assert!(cache.archive_index(&path).unwrap().is_none());
    }

    #[test]
    fn test_missing_archive() {
        let cache = TestCache::new();
        let lister = ArchiveLister::new(Arc::new(ArchiveRegistry::default()), Some(cache.store()));
        assert!(matches!(
            lister.list_entries(Path::new("/definitely/not/here.zip")),
            Err(ArchiveError::Io(_))
        ));
    }
}
