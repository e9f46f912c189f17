use super::{ArchiveError, ArchiveReader, MemberEntry};
use crate::record::FileType;
use chrono::{DateTime, Utc};
use sevenz_rust::{Archive, Error as SevenZError};
use std::fs::File;
use std::path::Path;
use std::time::SystemTime;

pub struct SevenZipReader;

impl ArchiveReader for SevenZipReader {
    fn list(&self, path: &Path) -> Result<Vec<MemberEntry>, ArchiveError> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        let archive = Archive::read(&mut file, len, &[]).map_err(map_error)?;

        Ok(archive
            .files
            .iter()
            .map(|entry| {
                let file_type = if entry.is_directory {
                    FileType::Dir
                } else {
                    FileType::File
                };
                let mtime = if entry.has_last_modified_date {
                    DateTime::<Utc>::from(SystemTime::from(entry.last_modified_date))
                } else {
                    DateTime::default()
                };
                MemberEntry::from_raw_path(&entry.name, entry.size, mtime, file_type)
            })
            .collect())
    }
}

fn map_error(err: SevenZError) -> ArchiveError {
    match err {
        SevenZError::PasswordRequired => ArchiveError::PasswordRequired,
        other => ArchiveError::Corrupt(other.to_string()),
    }
}
