//! Inverted index over a materialized result set
//!
//! Maps `archive` and `ext` values to record positions so repeated grouping
//! and filtering of the same records avoids a linear scan.

use crate::record::FileInfo;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvertedIndex {
    archives: HashMap<String, Vec<usize>>,
    extensions: HashMap<String, Vec<usize>>,
    len: usize,
}

impl InvertedIndex {
    /// Index every record by position. Empty values (plain filesystem entries,
    /// names without an extension) are indexed too.
    #[must_use]
    pub fn build(records: &[FileInfo]) -> Self {
        let mut index = Self {
            len: records.len(),
            ..Self::default()
        };
        for (position, record) in records.iter().enumerate() {
            index
                .archives
                .entry(record.archive.clone())
                .or_default()
                .push(position);
            index.extensions.entry(record.ext()).or_default().push(position);
        }
        index
    }

    /// Number of records the index was built over
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn by_archive(&self, archive: &str) -> &[usize] {
        self.archives.get(archive).map_or(&[], Vec::as_slice)
    }

    /// Positions of records with extension `ext`. A leading dot and case are
    /// ignored.
    #[must_use]
    pub fn by_ext(&self, ext: &str) -> &[usize] {
        self.extensions
            .get(&normalize_ext(ext))
            .map_or(&[], Vec::as_slice)
    }

    /// Records inside `archive`, in their original order
    #[must_use]
    pub fn filter_by_archive<'a>(&self, records: &'a [FileInfo], archive: &str) -> Vec<&'a FileInfo> {
        select(records, self.by_archive(archive))
    }

    #[must_use]
    pub fn filter_by_ext<'a>(&self, records: &'a [FileInfo], ext: &str) -> Vec<&'a FileInfo> {
        select(records, self.by_ext(ext))
    }

    /// Distinct non-empty archive paths, sorted
    #[must_use]
    pub fn archives(&self) -> Vec<&str> {
        sorted_keys(&self.archives)
    }

    /// Distinct non-empty extensions, sorted
    #[must_use]
    pub fn extensions(&self) -> Vec<&str> {
        sorted_keys(&self.extensions)
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn select<'a>(records: &'a [FileInfo], positions: &[usize]) -> Vec<&'a FileInfo> {
    positions.iter().filter_map(|&i| records.get(i)).collect()
}

fn sorted_keys(map: &HashMap<String, Vec<usize>>) -> Vec<&str> {
    let mut keys: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|key| !key.is_empty())
        .collect();
    keys.sort_unstable();
    keys
}
