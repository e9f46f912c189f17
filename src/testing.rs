//! Testing utilities for findz
//!
//! This module provides helper types and functions for writing tests,
//! including a `TestCache` wrapper for temporary cache stores and builders for
//! zip and tar fixtures.
//!
//! Only available when compiled with `cfg(test)`.

use crate::cache::CacheStore;
use std::fs;
use std::io::Write;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

/// Temporary directory that is removed with everything in it on drop
///
/// # Examples
/// ```ignore
/// let dir = TempDir::new();
/// std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
/// // Directory removed when dir is dropped
/// ```
pub struct TempDir(tempfile::TempDir);

impl TempDir {
    /// # Panics
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self(tempfile::tempdir().expect("Failed to create temp dir"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.0.path()
    }
}

impl Default for TempDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper for a temporary cache store that cleans up on drop
///
/// Derefs to [`CacheStore`]; [`store`](Self::store) hands out a shared handle
/// for walkers and listers.
pub struct TestCache {
    store: Arc<CacheStore>,
    _dir: TempDir,
}

impl TestCache {
    /// # Panics
    /// Panics if the store cannot be opened.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new();
        let store = CacheStore::open(dir.path().join("cache")).expect("Failed to open test cache");
        Self {
            store: Arc::new(store),
            _dir: dir,
        }
    }

    #[must_use]
    pub fn store(&self) -> Arc<CacheStore> {
        Arc::clone(&self.store)
    }
}

impl Default for TestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestCache {
    type Target = CacheStore;

    fn deref(&self) -> &CacheStore {
        &self.store
    }
}

impl Drop for TestCache {
    fn drop(&mut self) {
        // Best effort, the directory goes away with the TempDir
        let _ = self.store.clear();
    }
}

/// Create a file of `size` bytes, creating parent directories as needed
///
/// # Panics
/// Panics if the file cannot be written.
pub fn write_file(path: impl AsRef<Path>, size: usize) {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, vec![b'x'; size]).expect("Failed to write file");
}

/// Write a stored (uncompressed) zip with one member per `(name, size)`.
/// Parent directories of nested names get their own `dir/` entries.
///
/// # Panics
/// Panics if the archive cannot be written.
pub fn write_zip(path: impl AsRef<Path>, members: &[(&str, usize)]) {
    use zip::write::SimpleFileOptions;

    let file = fs::File::create(path).expect("Failed to create zip");
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut dirs: Vec<String> = Vec::new();

    for (name, size) in members {
        let mut prefix = String::new();
        for part in name.split('/').rev().skip(1).collect::<Vec<_>>().into_iter().rev() {
            prefix.push_str(part);
            prefix.push('/');
            if !dirs.contains(&prefix) {
                zip.add_directory(prefix.as_str(), options).expect("Failed to add dir");
                dirs.push(prefix.clone());
            }
        }
        zip.start_file(*name, options).expect("Failed to start member");
        zip.write_all(&vec![b'x'; *size]).expect("Failed to write member");
    }
    zip.finish().expect("Failed to finish zip");
}

fn append_members<W: Write>(builder: &mut tar::Builder<W>, members: &[(&str, usize)]) {
    for (name, size) in members {
        let data = vec![b'x'; *size];
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data.as_slice())
            .expect("Failed to append tar member");
    }
}

/// Write a plain tar with one regular file per `(name, size)`
///
/// # Panics
/// Panics if the archive cannot be written.
pub fn write_tar(path: impl AsRef<Path>, members: &[(&str, usize)]) {
    let file = fs::File::create(path).expect("Failed to create tar");
    let mut builder = tar::Builder::new(file);
    append_members(&mut builder, members);
    builder.finish().expect("Failed to finish tar");
}

/// Write a gzip-compressed tar with one regular file per `(name, size)`
///
/// # Panics
/// Panics if the archive cannot be written.
pub fn write_tar_gz(path: impl AsRef<Path>, members: &[(&str, usize)]) {
    let file = fs::File::create(path).expect("Failed to create tar.gz");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    append_members(&mut builder, members);
    builder
        .into_inner()
        .expect("Failed to finish tar")
        .finish()
        .expect("Failed to finish gzip");
}

/// The tree used by the scenario tests:
///
/// ```text
/// root/
///   a.txt          500 B
///   b.zip          inner.jpg (2 KiB)
///   docs/
///     c.log        20000 B
///     d.tar        one.txt, sub/two.log
/// ```
#[must_use]
pub fn sample_tree() -> TempDir {
    let dir = TempDir::new();
    let root = dir.path();
    write_file(root.join("a.txt"), 500);
    write_zip(root.join("b.zip"), &[("inner.jpg", 2048)]);
    write_file(root.join("docs/c.log"), 20000);
    write_tar(root.join("docs/d.tar"), &[("one.txt", 5), ("sub/two.log", 7)]);
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_cleanup() {
        let path = {
            let dir = TempDir::new();
            write_file(dir.path().join("x/y.txt"), 3);
            assert!(dir.path().join("x/y.txt").exists());
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_cache_is_usable() {
        let cache = TestCache::new();
        assert_eq!(cache.stats().unwrap().archives, 0);
        let shared = cache.store();
        assert!(shared.load_results().unwrap().is_none());
    }

    #[test]
    fn test_write_file_size() {
        let dir = TempDir::new();
        write_file(dir.path().join("f.bin"), 1234);
        assert_eq!(fs::metadata(dir.path().join("f.bin")).unwrap().len(), 1234);
    }

    #[test]
    fn test_sample_tree_layout() {
        let dir = sample_tree();
        assert!(dir.path().join("b.zip").is_file());
        assert!(dir.path().join("docs/d.tar").is_file());
        assert_eq!(fs::metadata(dir.path().join("a.txt")).unwrap().len(), 500);
    }
}
