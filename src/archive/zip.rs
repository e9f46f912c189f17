use super::{ArchiveError, ArchiveReader, MemberEntry};
use crate::record::FileType;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

pub struct ZipReader;

impl ArchiveReader for ZipReader {
    fn list(&self, path: &Path) -> Result<Vec<MemberEntry>, ArchiveError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file)).map_err(map_zip_error)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            // Raw access reads headers only, so encrypted members list fine.
            let member = archive.by_index_raw(index).map_err(map_zip_error)?;
            let file_type = if member.is_dir() {
                FileType::Dir
            } else {
                FileType::File
            };
            let mtime = member.last_modified().map(zip_time).unwrap_or_default();
            entries.push(MemberEntry::from_raw_path(
                member.name(),
                member.size(),
                mtime,
                file_type,
            ));
        }
        Ok(entries)
    }
}

/// Zip timestamps are local wall-clock time without a zone
fn zip_time(dt: zip::DateTime) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))
        .and_then(|date| {
            date.and_hms_opt(
                u32::from(dt.hour()),
                u32::from(dt.minute()),
                u32::from(dt.second()),
            )
        })
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_default()
}

fn map_zip_error(err: ZipError) -> ArchiveError {
    match err {
        ZipError::Io(e) => ArchiveError::Io(e),
        other => ArchiveError::Corrupt(other.to_string()),
    }
}
