//! Grouping and refining of a materialized result set
//!
//! [`group`] buckets records by archive, extension, or directory and keeps
//! count, total and average size per bucket. [`refine`] filters the buckets
//! with the regular filter language, restricted to the bucket symbols
//! `key`, `name`, `count`, `total_size` and `avg_size`.

use crate::filter::{EvalError, FieldSource, FilterExpression, ParseError, Value, format_size};
use crate::record::FileInfo;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Key for bucket names without an extension
pub const NO_EXTENSION: &str = "(none)";
/// Directory key for relative records at the top level
pub const ROOT_DIRECTORY: &str = "(root)";

const BUCKET_SYMBOLS: &[&str] = &["key", "name", "count", "total_size", "avg_size"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Enclosing archive; plain filesystem records are skipped
    Archive,
    Ext,
    /// Parent directory, with archive members placed under `archive//dir`
    Directory,
}

impl GroupKey {
    fn key_of(self, record: &FileInfo) -> Option<String> {
        match self {
            Self::Archive => (!record.archive.is_empty()).then(|| record.archive.clone()),
            Self::Ext => {
                let ext = record.ext();
                Some(if ext.is_empty() { NO_EXTENSION.to_string() } else { ext })
            }
            Self::Directory => Some(directory_of(record)),
        }
    }
}

/// `archive//dir` for members (`archive//` at the archive's top level), the
/// parent directory otherwise
fn directory_of(record: &FileInfo) -> String {
    let path = record.path.replace('\\', "/");
    if record.in_archive() {
        let parent = path.rfind('/').map_or("", |end| &path[..end]);
        return format!("{}//{parent}", record.archive.replace('\\', "/"));
    }
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(end) => path[..end].to_string(),
        None => ROOT_DIRECTORY.to_string(),
    }
}

/// Aggregate over the records sharing one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: String,
    /// Last path segment of the key
    pub name: String,
    pub count: usize,
    pub total_size: u64,
    /// Integer average, rounded down
    pub avg_size: u64,
    /// Positions of the bucket's records in the grouped slice
    pub members: Vec<usize>,
}

impl Bucket {
    fn new(key: String) -> Self {
        let name = key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or(key.as_str())
            .to_string();
        Self {
            key,
            name,
            count: 0,
            total_size: 0,
            avg_size: 0,
            members: Vec::new(),
        }
    }
}

impl FieldSource for Bucket {
    fn field(&self, name: &str) -> Option<Value> {
        let value = match name.to_ascii_lowercase().as_str() {
            "key" => Value::from(self.key.as_str()),
            "name" => Value::from(self.name.as_str()),
            "count" => Value::Number(i64::try_from(self.count).unwrap_or(i64::MAX)),
            "total_size" => Value::Number(i64::try_from(self.total_size).unwrap_or(i64::MAX)),
            "avg_size" => Value::Number(i64::try_from(self.avg_size).unwrap_or(i64::MAX)),
            _ => return None,
        };
        Some(value)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.key,
            self.count,
            format_size(self.total_size),
            format_size(self.avg_size)
        )
    }
}

/// Bucket `records` by `key`, in first-seen key order
#[must_use]
pub fn group(records: &[FileInfo], key: GroupKey) -> Vec<Bucket> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let Some(bucket_key) = key.key_of(record) else {
            continue;
        };
        let slot = *positions.entry(bucket_key.clone()).or_insert_with(|| {
            buckets.push(Bucket::new(bucket_key));
            buckets.len() - 1
        });
        let bucket = &mut buckets[slot];
        bucket.count += 1;
        bucket.total_size += record.size;
        bucket.members.push(index);
    }

    for bucket in &mut buckets {
        bucket.avg_size = bucket.total_size / bucket.count.max(1) as u64;
    }
    buckets
}

/// Filter over bucket aggregates
#[derive(Debug, Clone)]
pub struct RefineFilter(FilterExpression);

impl RefineFilter {
    /// Compile a refine expression such as `count > 10 and avg_size > 1M`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the text does not parse or names a symbol that
    /// is not a bucket field.
    pub fn compile(text: &str) -> Result<Self, ParseError> {
        let expression = FilterExpression::compile(text)?;
        if let Some(symbol) = expression
            .symbols()
            .into_iter()
            .find(|s| !BUCKET_SYMBOLS.contains(&s.to_ascii_lowercase().as_str()))
        {
            return Err(ParseError::UnknownSymbol(symbol.to_string()));
        }
        Ok(Self(expression))
    }

    /// # Errors
    ///
    /// Returns `EvalError` on a type mismatch such as `count = 'many'`.
    pub fn matches(&self, bucket: &Bucket) -> Result<bool, EvalError> {
        self.0.test(bucket)
    }
}

impl fmt::Display for RefineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Keep the buckets accepted by `filter`, preserving order
///
/// # Errors
///
/// Returns the first `EvalError` met.
pub fn refine(buckets: Vec<Bucket>, filter: &RefineFilter) -> Result<Vec<Bucket>, EvalError> {
    let mut kept = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        if filter.matches(&bucket)? {
            kept.push(bucket);
        }
    }
    Ok(kept)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Name,
    Count,
    TotalSize,
    #[default]
    AvgSize,
}

/// Stable sort; equal buckets keep their relative order in both directions
pub fn sort_buckets(buckets: &mut [Bucket], field: SortField, descending: bool) {
    let compare = |a: &Bucket, b: &Bucket| -> Ordering {
        match field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Count => a.count.cmp(&b.count),
            SortField::TotalSize => a.total_size.cmp(&b.total_size),
            SortField::AvgSize => a.avg_size.cmp(&b.avg_size),
        }
    };
    if descending {
        buckets.sort_by(|a, b| compare(b, a));
    } else {
        buckets.sort_by(compare);
    }
}
