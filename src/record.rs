use crate::archive::is_archive;
use crate::filter::{FieldSource, Value};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc, Weekday};
use std::fmt;
use std::path::Path;

/// Kind of a searchable entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    File,
    Dir,
    Link,
}

impl FileType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::Link => "link",
        }
    }

    /// Stable one-byte code used in cache rows
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::File => 0,
            Self::Dir => 1,
            Self::Link => 2,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::File),
            1 => Some(Self::Dir),
            2 => Some(Self::Link),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filesystem entry or one archive member
///
/// For archive members `path` is the path inside the archive and `archive` is
/// the absolute path of the archive file. For plain entries `archive` is empty.
/// Records are never mutated once the walker hands them out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub file_type: FileType,
    pub archive: String,
}

impl FileInfo {
    /// Enclosing archive; always equal to `archive`
    #[must_use]
    pub fn container(&self) -> &str {
        &self.archive
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Dir
    }

    #[must_use]
    pub fn in_archive(&self) -> bool {
        !self.archive.is_empty()
    }

    /// Lower-cased suffix without the dot, empty if there is none
    #[must_use]
    pub fn ext(&self) -> String {
        extension_of(&self.name)
    }

    /// Two-part suffix: `tar.gz` for `a.tar.gz`, `txt` for `a.txt`
    #[must_use]
    pub fn ext2(&self) -> String {
        let parts: Vec<&str> = self.name.split('.').collect();
        match parts.len() {
            0 | 1 => String::new(),
            2 => parts[1].to_lowercase(),
            n => format!("{}.{}", parts[n - 2], parts[n - 1]).to_lowercase(),
        }
    }

    /// Modification date in local time, `YYYY-MM-DD`
    #[must_use]
    pub fn date(&self) -> String {
        self.mod_time
            .with_timezone(&Local)
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Modification time of day in local time, `HH:MM:SS`
    #[must_use]
    pub fn time(&self) -> String {
        self.mod_time
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }

    /// An archive member that is itself an archive
    #[must_use]
    pub fn is_nested_archive(&self) -> bool {
        self.in_archive() && self.file_type == FileType::File && is_archive(&self.name)
    }

    /// A plain file on disk that the walker would open as an archive
    #[must_use]
    pub fn is_archive_file(&self) -> bool {
        !self.in_archive() && self.file_type == FileType::File && is_archive(&self.name)
    }
}

impl FieldSource for FileInfo {
    fn field(&self, name: &str) -> Option<Value> {
        let value = match name.to_ascii_lowercase().as_str() {
            "name" => Value::text(&self.name),
            "path" => Value::text(&self.path),
            "size" => Value::Number(i64::try_from(self.size).unwrap_or(i64::MAX)),
            "date" => Value::Text(self.date()),
            "time" => Value::Text(self.time()),
            "ext" => Value::Text(self.ext()),
            "ext2" => Value::Text(self.ext2()),
            "type" => Value::text(self.file_type.as_str()),
            "container" => Value::text(self.container()),
            "archive" => Value::text(&self.archive),
            other => return calendar_symbol(other, Local::now().date_naive()).map(Value::Text),
        };
        Some(value)
    }
}

/// Lower-cased extension of a file name
#[must_use]
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Resolve `today` and `mo`..`su` relative to `today`
#[must_use]
pub fn calendar_symbol(name: &str, today: NaiveDate) -> Option<String> {
    let date = if name == "today" {
        today
    } else {
        last_weekday(weekday_symbol(name)?, today)
    };
    Some(date.format("%Y-%m-%d").to_string())
}

fn weekday_symbol(name: &str) -> Option<Weekday> {
    let day = match name {
        "mo" => Weekday::Mon,
        "tu" => Weekday::Tue,
        "we" => Weekday::Wed,
        "th" => Weekday::Thu,
        "fr" => Weekday::Fri,
        "sa" => Weekday::Sat,
        "su" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Most recent strictly-earlier date falling on `weekday`
///
/// On a Monday, `mo` is the Monday a week ago.
#[must_use]
pub fn last_weekday(weekday: Weekday, today: NaiveDate) -> NaiveDate {
    let current = i64::from(today.weekday().num_days_from_monday());
    let target = i64::from(weekday.num_days_from_monday());
    let mut days_back = current - target;
    if days_back <= 0 {
        days_back += 7;
    }
    today - Duration::days(days_back)
}
