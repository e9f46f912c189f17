//! Configuration module for findz
//!
//! Settings come from an optional TOML file in the user's config directory
//! (`~/.config/findz/config.toml` on Linux) and `FINDZ_*` environment
//! variables, layered over the defaults. Nothing in the library requires a
//! config file; every API also takes explicit parameters.

use crate::cache::{CacheError, CacheStore};
use crate::filter::FilterExpression;
use crate::walk::{self, WalkParams};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FindzConfig {
    /// Directory of the on-disk cache store
    pub cache_dir: PathBuf,

    /// Cache archive listings and directory mtimes between runs
    pub use_cache: bool,

    /// Archive worker threads
    pub workers: usize,

    pub batch_size: usize,
    pub queue_capacity: usize,
    pub progress_interval: usize,
    pub follow_symlinks: bool,
}

impl Default for FindzConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            use_cache: true,
            workers: walk::default_workers(),
            batch_size: walk::DEFAULT_BATCH_SIZE,
            queue_capacity: walk::DEFAULT_QUEUE_CAPACITY,
            progress_interval: walk::DEFAULT_PROGRESS_INTERVAL,
            follow_symlinks: false,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("findz")
}

impl FindzConfig {
    /// Get the path to the config file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the system config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Message("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("findz").join("config.toml"))
    }

    /// Load configuration from the default location. A missing file is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or an environment value cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path` (optional) plus `FINDZ_*` variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or an environment value cannot be parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("FINDZ").try_parsing(true))
            .build()?;
        settings.try_deserialize()
    }

    /// Walk parameters for `filter` with this configuration's tuning
    #[must_use]
    pub fn walk_params(&self, filter: FilterExpression) -> WalkParams {
        let mut params = WalkParams::new(filter);
        params.follow_symlinks = self.follow_symlinks;
        params.workers = self.workers;
        params.batch_size = self.batch_size;
        params.queue_capacity = self.queue_capacity;
        params.progress_interval = self.progress_interval;
        params
    }

    /// Open the cache store at `cache_dir`
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the store cannot be opened.
    pub fn open_cache(&self) -> Result<Arc<CacheStore>, CacheError> {
        Ok(Arc::new(CacheStore::open(&self.cache_dir)?))
    }

    /// The cache store for a search, `None` when caching is off or the store
    /// cannot be opened. An open failure is logged and the search runs
    /// without a cache.
    #[must_use]
    pub fn search_cache(&self, no_cache: bool) -> Option<Arc<CacheStore>> {
        if no_cache || !self.use_cache {
            return None;
        }
        match self.open_cache() {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.cache_dir.display(), "cache unavailable, searching without it");
                None
            }
        }
    }
}
