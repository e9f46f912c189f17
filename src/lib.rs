//! findz - find files with a SQL-like filter
//!
//! This library searches directory trees, including the members of zip, tar,
//! 7z and rar archives, with a small query language
//! (`size > 10M and ext in ('jpg', 'png')`) or an equivalent JSON document.
//! Results stream lazily from [`walk::Walk`]; a result set can be saved to the
//! on-disk cache and grouped or refined later without rescanning.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod archive;
pub mod cache;
pub mod cli;
pub mod config;
pub mod filter;
pub mod group;
pub mod record;
pub mod walk;

#[cfg(test)]
pub mod testing;

use archive::{ArchiveError, ArchiveSelection};
use cache::{CacheError, CacheStore, QueryMetadata};
use filter::{EvalError, FilterExpression, ParseError};
use record::FileInfo;
use walk::{Walk, WalkParams, WalkStats};

/// Error enum, contains all failure states of the program
#[derive(Debug, Error)]
pub enum FindzError {
    /// Malformed filter text or document
    #[error("Filter error: {0}")]
    Parse(#[from] ParseError),
    /// Filter failed on a value
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),
    /// Cache store error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    /// Archive listing error
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    /// Represents a configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ::config::ConfigError),
    /// Represents an I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Options of [`search`]
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub follow_symlinks: bool,
    pub no_archive: bool,
    pub archives_only: bool,
    /// Archive worker threads, `None` for the default
    pub workers: Option<usize>,
    pub selection: ArchiveSelection,
    pub cache: Option<Arc<CacheStore>>,
}

impl SearchOptions {
    /// Walk parameters for `filter` with these options
    #[must_use]
    pub fn walk_params(&self, filter: FilterExpression) -> WalkParams {
        let mut params = WalkParams::new(filter);
        params.follow_symlinks = self.follow_symlinks;
        params.no_archive = self.no_archive;
        params.archives_only = self.archives_only;
        if let Some(workers) = self.workers {
            params.workers = workers;
        }
        params.selection = self.selection.clone();
        params.cache = self.cache.clone();
        params
    }
}

/// Start a lazy search.
///
/// `filter` may be filter text, a JSON document or a preset name.
///
/// # Errors
///
/// Returns `FindzError::Parse` if the filter does not compile. Errors met
/// while walking go to the error handler of the walk, which logs them.
pub fn search<I, P>(roots: I, filter: &str, options: &SearchOptions) -> Result<Walk, FindzError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let expression = filter::compile_input(filter)?;
    Ok(Walk::new(
        roots.into_iter().map(Into::into),
        options.walk_params(expression),
    ))
}

/// Records and counters of a finished search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub records: Vec<FileInfo>,
    /// Includes the count and paths of entries that could not be read
    pub stats: WalkStats,
}

/// A search whose result set becomes the last snapshot once it finishes.
///
/// Records stream as they are pulled; [`finish`](Self::finish) drains what
/// is left and writes the snapshot. A snapshot that cannot be written is
/// logged and the records are still returned.
pub struct CachedSearch<'a> {
    walk: Walk,
    metadata: QueryMetadata,
    records: Vec<FileInfo>,
    cache: &'a CacheStore,
}

impl<'a> CachedSearch<'a> {
    pub fn new<I, P>(roots: I, params: WalkParams, cache: &'a CacheStore) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots: Vec<PathBuf> = roots.into_iter().map(Into::into).collect();
        let metadata = QueryMetadata {
            filter: params.filter.to_string(),
            roots: roots.iter().map(|root| root.display().to_string()).collect(),
            archives_only: params.archives_only,
            no_archive: params.no_archive,
        };
        Self {
            walk: Walk::new(roots, params),
            metadata,
            records: Vec::new(),
            cache,
        }
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> &WalkStats {
        self.walk.stats()
    }

    /// Run the walk to its end and save the snapshot
    #[must_use]
    pub fn finish(self) -> SearchOutcome {
        let Self {
            mut walk,
            metadata,
            mut records,
            cache,
        } = self;
        records.extend(walk.by_ref());
        let stats = walk.stats().clone();
        tracing::debug!(records = records.len(), errors = stats.errors, "saving result snapshot");
        if let Err(e) = cache.save_results(metadata, &records) {
            tracing::warn!(error = %e, "result snapshot not saved");
        }
        SearchOutcome { records, stats }
    }
}

impl Iterator for CachedSearch<'_> {
    type Item = FileInfo;

    fn next(&mut self) -> Option<FileInfo> {
        let record = self.walk.next()?;
        self.records.push(record.clone());
        Some(record)
    }
}

/// Run a search to completion and save the result set as the last snapshot
#[must_use]
pub fn search_cached<I, P>(roots: I, params: WalkParams, cache: &CacheStore) -> SearchOutcome
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    CachedSearch::new(roots, params, cache).finish()
}

/// Records of the last saved snapshot, `None` if there is none or it is
/// unreadable
///
/// # Errors
///
/// Returns `FindzError::Cache` if the store cannot be read.
pub fn load_cached(cache: &CacheStore) -> Result<Option<Vec<FileInfo>>, FindzError> {
    Ok(cache.load_records()?)
}

/// Drop every cached entry
///
/// # Errors
///
/// Returns `FindzError::Cache` if the store cannot be cleared.
pub fn clear_cache(cache: &CacheStore) -> Result<(), FindzError> {
    cache.clear()?;
    Ok(())
}

/// Archives under `roots` that contain other archives, sorted and deduplicated
///
/// # Errors
///
/// Returns `FindzError::InvalidInput` if `options` turn off archive listing.
pub fn nested_archive_containers<I, P>(roots: I, options: &SearchOptions) -> Result<Vec<String>, FindzError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    if options.no_archive || options.archives_only {
        return Err(FindzError::InvalidInput(
            "nested archives need archive listing enabled".into(),
        ));
    }
    let params = options.walk_params(FilterExpression::accept_all());
    let mut containers: Vec<String> = Walk::new(roots.into_iter().map(Into::into), params)
        .filter(FileInfo::is_nested_archive)
        .map(|record| record.archive)
        .collect();
    containers.sort();
    containers.dedup();
    Ok(containers)
}
