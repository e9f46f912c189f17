//! On-disk cache for findz
//!
//! Uses sled as the embedded store with one tree per entity:
//! - `meta`: format version
//! - `dir_mtime`: directory path -> last observed modification time
//! - `archives`: archive path -> [`ArchiveIndex`] (member listing + checksum)
//! - `results`: the snapshot of the last saved search
//!
//! Archive indexes are fronted by an in-memory moka cache so workers listing
//! the same archive within one process skip the decode.
//!
//! Nothing stored here is authoritative. Every read failure is reported as a
//! [`CacheError`] or a miss, and callers rescan.

pub mod error;
pub mod index;
pub mod types;

pub use error::CacheError;
pub use index::InvertedIndex;
pub use types::{
    ArchiveIndex, CacheStats, PathKey, QueryMetadata, RecordRow, ResultSnapshot, Stamp,
};

use crate::record::FileInfo;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use sled::{Db, Tree};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bumped whenever a stored type changes shape. A store written with another
/// version is wiped on open.
pub const CACHE_VERSION: u32 = 1;

const VERSION_KEY: &[u8] = b"version";
const LAST_RESULTS_KEY: &[u8] = b"last";
const HOT_CAPACITY: u64 = 512;

/// Handle to the cache store, shared by reference between the walker and the
/// archive lister
pub struct CacheStore {
    db: Db,
    meta: Tree,
    dirs: Tree,
    archives: Tree,
    results: Tree,
    hot: Cache<PathBuf, Arc<ArchiveIndex>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("archives", &self.archives.len())
            .field("dirs", &self.dirs.len())
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Opens or creates a cache store at the specified directory
    ///
    /// # Examples
    /// ```no_run
    /// use findz::cache::CacheStore;
    /// let cache = CacheStore::open("/tmp/findz-cache").unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store or one of its trees cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let db = sled::open(path)?;
        let store = Self {
            meta: db.open_tree("meta")?,
            dirs: db.open_tree("dir_mtime")?,
            archives: db.open_tree("archives")?,
            results: db.open_tree("results")?,
            hot: Cache::builder().max_capacity(HOT_CAPACITY).build(),
            db,
        };
        store.check_version()?;
        Ok(store)
    }

    fn check_version(&self) -> Result<(), CacheError> {
        let stored = match self.meta.get(VERSION_KEY)? {
            Some(bytes) => bincode::decode_from_slice::<u32, _>(&bytes, bincode::config::standard())
                .map(|(version, _)| version)
                .ok(),
            None => None,
        };
        match stored {
            Some(CACHE_VERSION) => Ok(()),
            Some(other) => {
                tracing::warn!(found = other, expected = CACHE_VERSION, "cache version mismatch, clearing");
                self.clear()
            }
            None if self.archives.is_empty() && self.dirs.is_empty() && self.results.is_empty() => {
                self.write_version()
            }
            None => {
                tracing::warn!("cache has no readable version, clearing");
                self.clear()
            }
        }
    }

    fn write_version(&self) -> Result<(), CacheError> {
        let bytes = bincode::encode_to_vec(CACHE_VERSION, bincode::config::standard())?;
        self.meta.insert(VERSION_KEY, bytes)?;
        Ok(())
    }

    /// Whether a directory changed since [`record_dir`](Self::record_dir) last
    /// saw it. A directory that cannot be stat'ed, was never recorded, or whose
    /// entry cannot be read counts as changed.
    #[must_use]
    pub fn is_dir_changed<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        let Ok(modified) = fs::metadata(path).and_then(|meta| meta.modified()) else {
            return true;
        };
        let current = Stamp::from(DateTime::<Utc>::from(modified));
        match self.dir_mtime(path) {
            Ok(Some(stored)) => stored != current,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable dir mtime entry");
                true
            }
        }
    }

    /// Recorded modification time of a directory
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store read or the decode fails.
    pub fn dir_mtime<P: AsRef<Path>>(&self, path: P) -> Result<Option<Stamp>, CacheError> {
        let key: Vec<u8> = PathKey::new(path).try_into()?;
        match self.dirs.get(key)? {
            Some(bytes) => {
                let (stamp, _): (Stamp, usize) =
                    bincode::decode_from_slice(&bytes, bincode::config::standard())?;
                Ok(Some(stamp))
            }
            None => Ok(None),
        }
    }

    /// Remember the modification time observed for a directory
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if encoding or the store write fails.
    pub fn record_dir<P: AsRef<Path>>(&self, path: P, mtime: DateTime<Utc>) -> Result<(), CacheError> {
        let key: Vec<u8> = PathKey::new(path).try_into()?;
        let value = bincode::encode_to_vec(Stamp::from(mtime), bincode::config::standard())?;
        self.dirs.insert(key, value)?;
        Ok(())
    }

    /// Cached listing for an archive, regardless of whether it is still
    /// current. Compare [`ArchiveIndex::checksum`] with [`checksum`] to decide.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store read or the decode fails.
    pub fn archive_index<P: AsRef<Path>>(&self, path: P) -> Result<Option<Arc<ArchiveIndex>>, CacheError> {
        let key = PathKey::new(path);
        if let Some(index) = self.hot.get(&key.0) {
            return Ok(Some(index));
        }

        let path = key.0.clone();
        let bytes: Vec<u8> = key.try_into()?;
        match self.archives.get(bytes)? {
            Some(value) => {
                let (index, _): (ArchiveIndex, usize) =
                    bincode::decode_from_slice(&value, bincode::config::standard())?;
                let index = Arc::new(index);
                self.hot.insert(path, Arc::clone(&index));
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Store the listing of an archive, replacing any previous entry for the
    /// same path in a single insert
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if encoding or the store write fails.
    pub fn store_archive_index(&self, index: ArchiveIndex) -> Result<Arc<ArchiveIndex>, CacheError> {
        let key = PathKey::new(&index.archive_path);
        let path = key.0.clone();
        let bytes: Vec<u8> = key.try_into()?;
        let value = bincode::encode_to_vec(&index, bincode::config::standard())?;
        self.archives.insert(bytes, value)?;

        let index = Arc::new(index);
        self.hot.insert(path, Arc::clone(&index));
        Ok(index)
    }

    /// Drop the cached listing of one archive
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store write fails.
    pub fn remove_archive_index<P: AsRef<Path>>(&self, path: P) -> Result<bool, CacheError> {
        let key = PathKey::new(path);
        self.hot.invalidate(&key.0);
        let bytes: Vec<u8> = key.try_into()?;
        Ok(self.archives.remove(bytes)?.is_some())
    }

    /// Save the records of a finished search as the "last results" snapshot
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if encoding or the store write fails.
    pub fn save_results(&self, metadata: QueryMetadata, records: &[FileInfo]) -> Result<(), CacheError> {
        let snapshot = ResultSnapshot::new(CACHE_VERSION, metadata, records);
        let value = bincode::encode_to_vec(&snapshot, bincode::config::standard())?;
        self.results.insert(LAST_RESULTS_KEY, value)?;
        tracing::debug!(records = records.len(), "saved result snapshot");
        Ok(())
    }

    /// Load the last saved snapshot. A snapshot that cannot be decoded or was
    /// written by another version is a miss.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` only if the store itself cannot be read.
    pub fn load_results(&self) -> Result<Option<ResultSnapshot>, CacheError> {
        let Some(bytes) = self.results.get(LAST_RESULTS_KEY)? else {
            return Ok(None);
        };
        match bincode::decode_from_slice::<ResultSnapshot, _>(&bytes, bincode::config::standard()) {
            Ok((snapshot, _)) if snapshot.version == CACHE_VERSION => Ok(Some(snapshot)),
            Ok((snapshot, _)) => {
                tracing::warn!(found = snapshot.version, "stale result snapshot ignored");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "corrupt result snapshot ignored");
                Ok(None)
            }
        }
    }

    /// Records of the last saved snapshot. A snapshot holding a malformed row
    /// is a miss like an undecodable one.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` only if the store itself cannot be read.
    pub fn load_records(&self) -> Result<Option<Vec<FileInfo>>, CacheError> {
        let Some(snapshot) = self.load_results()? else {
            return Ok(None);
        };
        match snapshot.records() {
            Ok(records) => Ok(Some(records)),
            Err(e) => {
                tracing::warn!(error = %e, "result snapshot with invalid rows ignored");
                Ok(None)
            }
        }
    }

    /// Flush pending writes to disk
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the flush fails.
    pub fn flush(&self) -> Result<(), CacheError> {
        self.db.flush()?;
        Ok(())
    }

    /// Remove every cached entry. The version marker is rewritten.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if a tree cannot be cleared.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.dirs.clear()?;
        self.archives.clear()?;
        self.results.clear()?;
        self.meta.clear()?;
        self.hot.invalidate_all();
        self.write_version()
    }

    /// Counts over the stored archive indexes and directory entries
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if an entry cannot be read or decoded.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats {
            directories: self.dirs.len(),
            has_results: self.results.contains_key(LAST_RESULTS_KEY)?,
            ..CacheStats::default()
        };
        for item in self.archives.iter() {
            let (_, value) = item?;
            let (index, _): (ArchiveIndex, usize) =
                bincode::decode_from_slice(&value, bincode::config::standard())?;
            stats.archives += 1;
            stats.members += index.members.len();
            stats.archive_bytes += index.archive_size;
        }
        Ok(stats)
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        // Best-effort flush; call flush() for guaranteed durability.
        let _ = self.db.flush();
    }
}

/// Invalidation key of an archive: xxh3 over path, size and modification time
#[must_use]
pub fn checksum(path: &Path, size: u64, mtime: DateTime<Utc>) -> String {
    let data = format!(
        "{}:{size}:{}.{:09}",
        path.display(),
        mtime.timestamp(),
        mtime.timestamp_subsec_nanos()
    );
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileType;
    use crate::testing::{TempDir, TestCache};
    use chrono::TimeZone;

    fn member(name: &str, archive: &str) -> FileInfo {
        FileInfo {
            name: name.into(),
            path: format!("inner/{name}"),
            size: 10,
            mod_time: Utc.timestamp_opt(1_600_000_000, 5).unwrap(),
            file_type: FileType::File,
            archive: archive.into(),
        }
    }

    fn index_for(path: &str, checksum: &str, names: &[&str]) -> ArchiveIndex {
        ArchiveIndex {
            archive_path: path.into(),
            archive_mtime: Stamp { secs: 1, nanos: 0 },
            archive_size: 100,
            checksum: checksum.into(),
            members: names.iter().map(|n| RecordRow::from(&member(n, path))).collect(),
            scanned_at: 0,
        }
    }

    #[test]
    fn test_checksum_changes_with_inputs() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let base = checksum(Path::new("/a.zip"), 10, t);
        assert_eq!(base, checksum(Path::new("/a.zip"), 10, t));
        assert_ne!(base, checksum(Path::new("/a.zip"), 11, t));
        assert_ne!(base, checksum(Path::new("/b.zip"), 10, t));
        assert_ne!(base, checksum(Path::new("/a.zip"), 10, t + chrono::Duration::nanoseconds(1)));
        assert_eq!(base.len(), 16);
    }

    #[test]
    fn test_archive_index_round_trip() {
        let cache = TestCache::new();
        assert!(cache.archive_index("/data/b.zip").unwrap().is_none());

        cache.store_archive_index(index_for("/data/b.zip", "c1", &["x.jpg", "y.txt"])).unwrap();
        let stored = cache.archive_index("/data/b.zip").unwrap().unwrap();
        assert_eq!(stored.checksum, "c1");
        let records = stored.records().unwrap();
        assert_eq!(records[0].name, "x.jpg");
        assert_eq!(records[1].archive, "/data/b.zip");
    }

    #[test]
    fn test_store_replaces_entry() {
        let cache = TestCache::new();
        cache.store_archive_index(index_for("/data/b.zip", "old", &["x.jpg"])).unwrap();
        cache.store_archive_index(index_for("/data/b.zip", "new", &["y.jpg", "z.jpg"])).unwrap();
        let stored = cache.archive_index("/data/b.zip").unwrap().unwrap();
        assert_eq!(stored.checksum, "new");
        assert_eq!(stored.members.len(), 2);
        assert_eq!(cache.stats().unwrap().archives, 1);
    }

    #[test]
    fn test_remove_archive_index() {
        let cache = TestCache::new();
        cache.store_archive_index(index_for("/data/b.zip", "c", &["x"])).unwrap();
        assert!(cache.remove_archive_index("/data/b.zip").unwrap());
        assert!(!cache.remove_archive_index("/data/b.zip").unwrap());
        assert!(cache.archive_index("/data/b.zip").unwrap().is_none());
    }

    #[test]
    fn test_dir_changed_tracking() {
        let cache = TestCache::new();
        let dir = TempDir::new();
        assert!(cache.is_dir_changed(dir.path()));

        let modified = fs::metadata(dir.path()).unwrap().modified().unwrap();
        cache.record_dir(dir.path(), DateTime::<Utc>::from(modified)).unwrap();
        assert!(!cache.is_dir_changed(dir.path()));

        cache.record_dir(dir.path(), Utc.timestamp_opt(0, 0).unwrap()).unwrap();
        assert!(cache.is_dir_changed(dir.path()));
        assert!(cache.is_dir_changed(dir.path().join("missing")));
    }

    #[test]
    fn test_results_snapshot() {
        let cache = TestCache::new();
        assert!(cache.load_results().unwrap().is_none());

        let records = vec![member("a.txt", ""), member("b.jpg", "/x.zip")];
        let metadata = QueryMetadata {
            filter: "size > 1".into(),
            roots: vec![".".into()],
            ..QueryMetadata::default()
        };
        cache.save_results(metadata.clone(), &records).unwrap();

        let snapshot = cache.load_results().unwrap().unwrap();
        assert_eq!(snapshot.version, CACHE_VERSION);
        assert_eq!(snapshot.metadata, metadata);
        assert_eq!(snapshot.records().unwrap(), records);
    }

    #[test]
    fn test_corrupt_snapshot_is_miss() {
        let cache = TestCache::new();
        cache.results.insert(LAST_RESULTS_KEY, b"garbage".to_vec()).unwrap();
        assert!(cache.load_results().unwrap().is_none());
    }

    #[test]
    fn test_stale_snapshot_is_miss() {
        let cache = TestCache::new();
        let mut snapshot = ResultSnapshot::new(CACHE_VERSION, QueryMetadata::default(), &[]);
        snapshot.version = CACHE_VERSION + 1;
        let bytes = bincode::encode_to_vec(&snapshot, bincode::config::standard()).unwrap();
        cache.results.insert(LAST_RESULTS_KEY, bytes).unwrap();
        assert!(cache.load_results().unwrap().is_none());
    }

    #[test]
    fn test_invalid_row_is_miss() {
        let cache = TestCache::new();
        let mut snapshot = ResultSnapshot::new(CACHE_VERSION, QueryMetadata::default(), &[member("a.txt", "")]);
        snapshot.rows[0].4 = 9;
        let bytes = bincode::encode_to_vec(&snapshot, bincode::config::standard()).unwrap();
        cache.results.insert(LAST_RESULTS_KEY, bytes).unwrap();

        assert!(cache.load_results().unwrap().is_some());
        assert!(cache.load_records().unwrap().is_none());
    }

    #[test]
    fn test_load_records() {
        let cache = TestCache::new();
        assert!(cache.load_records().unwrap().is_none());
        let records = vec![member("a.txt", "")];
        cache.save_results(QueryMetadata::default(), &records).unwrap();
        assert_eq!(cache.load_records().unwrap(), Some(records));
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = TestCache::new();
        cache.store_archive_index(index_for("/a.zip", "c", &["1", "2"])).unwrap();
        cache.store_archive_index(index_for("/b.zip", "c", &["3"])).unwrap();
        cache.record_dir("/tmp", Utc::now()).unwrap();
        cache.save_results(QueryMetadata::default(), &[]).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.archives, 2);
        assert_eq!(stats.members, 3);
        assert_eq!(stats.archive_bytes, 200);
        assert_eq!(stats.directories, 1);
        assert!(stats.has_results);

        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap(), CacheStats::default());
        assert!(cache.archive_index("/a.zip").unwrap().is_none());
    }

    #[test]
    fn test_version_mismatch_wipes_store() {
        let dir = TempDir::new();
        let path = dir.path().join("cache");
        {
            let cache = CacheStore::open(&path).unwrap();
            cache.store_archive_index(index_for("/a.zip", "c", &["1"])).unwrap();
            let bytes = bincode::encode_to_vec(CACHE_VERSION + 7, bincode::config::standard()).unwrap();
            cache.meta.insert(VERSION_KEY, bytes).unwrap();
            cache.flush().unwrap();
        }
        let cache = CacheStore::open(&path).unwrap();
        assert!(cache.archive_index("/a.zip").unwrap().is_none());
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = TempDir::new();
        let path = dir.path().join("cache");
        {
            let cache = CacheStore::open(&path).unwrap();
            cache.store_archive_index(index_for("/a.zip", "c", &["1"])).unwrap();
        }
        let cache = CacheStore::open(&path).unwrap();
        assert_eq!(cache.archive_index("/a.zip").unwrap().unwrap().checksum, "c");
    }
}
