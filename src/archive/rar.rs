use super::{ArchiveError, ArchiveReader, MemberEntry};
use crate::record::FileType;
use chrono::DateTime;
use std::path::Path;
use unrar::Archive;

pub struct RarReader;

impl ArchiveReader for RarReader {
    fn list(&self, path: &Path) -> Result<Vec<MemberEntry>, ArchiveError> {
        let listing = Archive::new(path).open_for_listing().map_err(map_error)?;

        let mut entries = Vec::new();
        for header in listing {
            let header = header.map_err(map_error)?;
            let file_type = if header.is_directory() {
                FileType::Dir
            } else {
                FileType::File
            };
            let raw_path = header.filename.to_string_lossy().replace('\\', "/");
            entries.push(MemberEntry::from_raw_path(
                &raw_path,
                header.unpacked_size,
                DateTime::default(),
                file_type,
            ));
        }
        Ok(entries)
    }
}

fn map_error(err: unrar::error::UnrarError) -> ArchiveError {
    let message = err.to_string();
    if message.to_lowercase().contains("password") {
        ArchiveError::PasswordRequired
    } else {
        ArchiveError::Corrupt(message)
    }
}
