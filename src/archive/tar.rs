use super::{ArchiveError, ArchiveReader, MemberEntry};
use crate::record::FileType;
use bzip2::read::BzDecoder;
use chrono::DateTime;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use xz2::read::XzDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

pub struct TarReader {
    compression: Compression,
}

impl TarReader {
    pub const fn new(compression: Compression) -> Self {
        Self { compression }
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>, ArchiveError> {
        let file = BufReader::new(File::open(path)?);
        Ok(match self.compression {
            Compression::None => Box::new(file),
            Compression::Gzip => Box::new(GzDecoder::new(file)),
            Compression::Bzip2 => Box::new(BzDecoder::new(file)),
            Compression::Xz => Box::new(XzDecoder::new(file)),
        })
    }
}

impl ArchiveReader for TarReader {
    fn list(&self, path: &Path) -> Result<Vec<MemberEntry>, ArchiveError> {
        let mut archive = tar::Archive::new(self.open(path)?);
        let corrupt = |e: std::io::Error| ArchiveError::Corrupt(e.to_string());

        let mut entries = Vec::new();
        for entry in archive.entries().map_err(corrupt)? {
            let entry = entry.map_err(corrupt)?;
            let header = entry.header();
            let kind = header.entry_type();
            // Devices, fifos and pax/gnu metadata records are not searchable
            let file_type = if kind.is_file() {
                FileType::File
            } else if kind.is_dir() {
                FileType::Dir
            } else if kind.is_symlink() || kind.is_hard_link() {
                FileType::Link
            } else {
                continue;
            };

            let raw_path = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();
            let mtime = header
                .mtime()
                .ok()
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or_default();
            entries.push(MemberEntry::from_raw_path(
                &raw_path,
                entry.size(),
                mtime,
                file_type,
            ));
        }
        Ok(entries)
    }
}
