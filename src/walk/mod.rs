//! Filesystem and archive traversal
//!
//! [`Walk`] is a pull-based iterator. Directory traversal runs on the thread
//! that calls `next()`: one directory is enumerated per step, children in name
//! order, using an explicit stack. Archive files found along the way collect
//! into batches; a full batch (or the end of traversal) is handed to a rayon
//! pool of `workers` threads. Each worker lists one archive through the
//! [`ArchiveLister`], applies the [`ArchiveSelection`] and the filter, and
//! sends the matches back over a bounded crossbeam channel.
//!
//! Members of one archive arrive together and in listing order. Archives
//! arrive in completion order.
//!
//! Dropping the iterator cancels the walk: archive tasks not yet started are
//! skipped and running ones finish without delivering.

pub mod error;

pub use error::FindError;

use crate::archive::{ArchiveLister, ArchiveRegistry, ArchiveSelection, is_archive, system_time_to_utc};
use crate::cache::CacheStore;
use crate::filter::FilterExpression;
use crate::record::{FileInfo, FileType};
use crossbeam_channel::{Receiver, Sender};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives every [`FindError`]. `Break` stops the walk.
pub type ErrorHandler = Arc<dyn Fn(&FindError) -> ControlFlow<()> + Send + Sync>;

/// Receives throttled [`Progress`] snapshots
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

/// `min(available parallelism, 4)`
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(4)
}

/// Logs the error at `warn` and continues
#[must_use]
pub fn log_errors() -> ErrorHandler {
    Arc::new(|error: &FindError| {
        tracing::warn!(path = %error.path().display(), "{error}");
        ControlFlow::Continue(())
    })
}

/// Everything a walk needs besides its roots
#[derive(Clone)]
pub struct WalkParams {
    pub filter: Arc<FilterExpression>,
    pub follow_symlinks: bool,
    /// Do not look inside archives
    pub no_archive: bool,
    /// Report archive files only, never their members
    pub archives_only: bool,
    /// Archive worker threads; 0 or 1 lists archives on the calling thread
    pub workers: usize,
    /// Archives collected before a batch is dispatched
    pub batch_size: usize,
    /// Maximum archives in flight and capacity of the result channel
    pub queue_capacity: usize,
    /// Scanned entries between two progress reports
    pub progress_interval: usize,
    pub selection: ArchiveSelection,
    pub registry: Arc<ArchiveRegistry>,
    pub cache: Option<Arc<CacheStore>>,
    pub on_error: ErrorHandler,
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for WalkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkParams")
            .field("filter", &self.filter.to_string())
            .field("follow_symlinks", &self.follow_symlinks)
            .field("no_archive", &self.no_archive)
            .field("archives_only", &self.archives_only)
            .field("workers", &self.workers)
            .field("batch_size", &self.batch_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("progress_interval", &self.progress_interval)
            .field("selection", &self.selection)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl WalkParams {
    /// Defaults: no symlink following, archives searched, default worker
    /// count, no cache, errors logged
    #[must_use]
    pub fn new(filter: FilterExpression) -> Self {
        Self {
            filter: Arc::new(filter),
            follow_symlinks: false,
            no_archive: false,
            archives_only: false,
            workers: default_workers(),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            selection: ArchiveSelection::default(),
            registry: Arc::new(ArchiveRegistry::default()),
            cache: None,
            on_error: log_errors(),
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FindError) -> ControlFlow<()> + Send + Sync + 'static,
    {
        self.on_error = Arc::new(handler);
        self
    }

    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

/// Snapshot handed to the progress callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub scanned: usize,
    pub matched: usize,
    pub current: PathBuf,
    pub finished: bool,
}

/// Counters of a walk, final once the iterator returns `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Filesystem entries plus archive members tested
    pub scanned: usize,
    pub matched: usize,
    pub archives: usize,
    /// Directories whose mtime matched the cache entry from an earlier walk
    pub unchanged_dirs: usize,
    pub errors: usize,
    pub failed: Vec<PathBuf>,
}

/// Walk a single root
#[must_use]
pub fn walk<P: AsRef<Path>>(root: P, params: WalkParams) -> Walk {
    Walk::new([root.as_ref().to_path_buf()], params)
}

/// Matches and errors of one archive task
struct ArchiveOutcome {
    archive: PathBuf,
    scanned: usize,
    matched: Vec<FileInfo>,
    errors: Vec<FindError>,
}

/// Shared, read-only state of the archive workers
struct ArchiveTask {
    lister: ArchiveLister,
    filter: Arc<FilterExpression>,
    selection: ArchiveSelection,
}

impl ArchiveTask {
    fn run(&self, archive: PathBuf) -> ArchiveOutcome {
        let mut outcome = ArchiveOutcome {
            archive,
            scanned: 0,
            matched: Vec::new(),
            errors: Vec::new(),
        };
        let members = match self.lister.list_entries(&outcome.archive) {
            Ok(members) => self.selection.apply(members),
            Err(source) => {
                outcome.errors.push(FindError::Archive {
                    path: outcome.archive.clone(),
                    source,
                });
                return outcome;
            }
        };

        outcome.scanned = members.len();
        for member in members {
            match self.filter.test(&member) {
                Ok(true) => outcome.matched.push(member),
                Ok(false) => {}
                Err(source) => outcome.errors.push(FindError::Eval {
                    path: Path::new(&member.archive).join(&member.path),
                    source,
                }),
            }
        }
        outcome
    }
}

/// Lazy search over one or more roots. See the module docs.
pub struct Walk {
    params: WalkParams,
    task: Arc<ArchiveTask>,
    roots: VecDeque<PathBuf>,
    dirs: Vec<PathBuf>,
    visited: HashSet<PathBuf>,
    ready: VecDeque<FileInfo>,
    batch: Vec<PathBuf>,
    pool: Option<rayon::ThreadPool>,
    pool_failed: bool,
    tx: Sender<ArchiveOutcome>,
    rx: Receiver<ArchiveOutcome>,
    in_flight: usize,
    cancelled: Arc<AtomicBool>,
    stats: WalkStats,
    current: PathBuf,
    next_progress: usize,
    started: bool,
    stopped: bool,
    finished: bool,
}

impl Walk {
    #[must_use]
    pub fn new<I>(roots: I, params: WalkParams) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let (tx, rx) = crossbeam_channel::bounded(params.queue_capacity.max(1));
        let task = Arc::new(ArchiveTask {
            lister: ArchiveLister::new(Arc::clone(&params.registry), params.cache.clone()),
            filter: Arc::clone(&params.filter),
            selection: params.selection.clone(),
        });
        Self {
            next_progress: params.progress_interval.max(1),
            params,
            task,
            roots: roots.into_iter().collect(),
            dirs: Vec::new(),
            visited: HashSet::new(),
            ready: VecDeque::new(),
            batch: Vec::new(),
            pool: None,
            pool_failed: false,
            tx,
            rx,
            in_flight: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            stats: WalkStats::default(),
            current: PathBuf::new(),
            started: false,
            stopped: false,
            finished: false,
        }
    }

    #[must_use]
    pub const fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Route an error to the handler and record it
    fn report(&mut self, error: &FindError) {
        self.stats.errors += 1;
        self.stats.failed.push(error.path().to_path_buf());
        if (self.params.on_error)(error).is_break() {
            tracing::debug!(path = %error.path().display(), "walk stopped by error handler");
            self.stop();
        }
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.cancelled.store(true, Ordering::SeqCst);
        self.batch.clear();
        self.dirs.clear();
        self.roots.clear();
    }

    fn progress(&mut self, finished: bool) {
        let Some(callback) = &self.params.on_progress else {
            return;
        };
        callback(&Progress {
            scanned: self.stats.scanned,
            matched: self.stats.matched,
            current: self.current.clone(),
            finished,
        });
    }

    fn count_scanned(&mut self, n: usize) {
        self.stats.scanned += n;
        if self.stats.scanned >= self.next_progress {
            let interval = self.params.progress_interval.max(1);
            self.next_progress = (self.stats.scanned / interval + 1) * interval;
            self.progress(false);
        }
    }

    fn emit(&mut self, record: FileInfo) {
        self.stats.matched += 1;
        self.ready.push_back(record);
    }

    fn test_and_emit(&mut self, record: FileInfo) {
        match self.params.filter.test(&record) {
            Ok(true) => self.emit(record),
            Ok(false) => {}
            Err(source) => {
                let error = FindError::Eval {
                    path: PathBuf::from(&record.path),
                    source,
                };
                self.report(&error);
            }
        }
    }

    /// Stat one entry, test it, and queue follow-up work
    fn visit(&mut self, path: PathBuf) {
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => return self.report(&FindError::from_io(path, e)),
        };

        let mut file_type = if metadata.file_type().is_symlink() {
            FileType::Link
        } else if metadata.is_dir() {
            FileType::Dir
        } else {
            FileType::File
        };
        let mut metadata = metadata;
        if file_type == FileType::Link && self.params.follow_symlinks {
            match fs::metadata(&path) {
                Ok(target) => {
                    file_type = if target.is_dir() { FileType::Dir } else { FileType::File };
                    metadata = target;
                }
                Err(e) => return self.report(&FindError::from_io(path, e)),
            }
        }

        let name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
            .into_owned();
        let record = FileInfo {
            name,
            path: path.to_string_lossy().into_owned(),
            size: metadata.len(),
            mod_time: system_time_to_utc(metadata.modified()),
            file_type,
            archive: String::new(),
        };
        self.count_scanned(1);

        let listable = file_type == FileType::File
            && !self.params.no_archive
            && !self.params.archives_only
            && self.params.registry.is_listable(&path);

        if self.params.archives_only {
            if file_type != FileType::Dir && is_archive(&record.name) {
                self.test_and_emit(record);
            }
        } else {
            self.test_and_emit(record);
        }

        if file_type == FileType::Dir {
            self.dirs.push(path);
        } else if listable {
            self.batch.push(path);
            if self.batch.len() >= self.params.batch_size.max(1) {
                self.flush_batch();
            }
        }
    }

    /// Enumerate one directory and visit its children in name order
    fn enumerate(&mut self, dir: PathBuf) {
        if self.params.follow_symlinks {
            let key = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !self.visited.insert(key) {
                tracing::debug!(path = %dir.display(), "symlink loop skipped");
                return;
            }
        }
        self.current.clone_from(&dir);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => return self.report(&FindError::from_io(dir, e)),
        };
        let mut children = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => children.push(entry.file_name()),
                Err(e) => self.report(&FindError::from_io(dir.clone(), e)),
            }
        }
        children.sort_unstable();
        self.note_dir(&dir);

        let depth = self.dirs.len();
        for child in children {
            if self.stopped {
                return;
            }
            self.visit(dir.join(child));
        }
        // Subdirectories were pushed in name order; pop them in name order too
        if let Some(pushed) = self.dirs.get_mut(depth..) {
            pushed.reverse();
        }
    }

    /// Compare with and update the directory mtime cache
    fn note_dir(&mut self, dir: &Path) {
        let Some(cache) = &self.params.cache else {
            return;
        };
        if !cache.is_dir_changed(dir) {
            self.stats.unchanged_dirs += 1;
        }
        let modified = fs::metadata(dir).and_then(|m| m.modified());
        if let Err(e) = cache.record_dir(dir, system_time_to_utc(modified)) {
            tracing::warn!(path = %dir.display(), error = %e, "failed to record dir mtime");
        }
    }

    fn flush_batch(&mut self) {
        let batch = std::mem::take(&mut self.batch);
        if batch.is_empty() {
            return;
        }
        tracing::trace!(archives = batch.len(), "dispatching archive batch");
        for archive in batch {
            if self.stopped {
                return;
            }
            self.dispatch(archive);
        }
    }

    fn dispatch(&mut self, archive: PathBuf) {
        self.stats.archives += 1;
        if !self.ensure_pool() {
            let outcome = self.task.run(archive);
            return self.absorb(outcome);
        }

        while self.in_flight >= self.params.queue_capacity.max(1) && !self.stopped {
            self.receive_one();
        }
        if self.stopped {
            return;
        }

        let task = Arc::clone(&self.task);
        let tx = self.tx.clone();
        let cancelled = Arc::clone(&self.cancelled);
        self.in_flight += 1;
        let Some(pool) = &self.pool else {
            return;
        };
        pool.spawn(move || {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            // The receiver is gone once the walk is dropped
            let _ = tx.send(task.run(archive));
        });
    }

    /// Build the worker pool on first use. `false` means list inline.
    fn ensure_pool(&mut self) -> bool {
        if self.params.workers <= 1 || self.pool_failed {
            return false;
        }
        if self.pool.is_some() {
            return true;
        }
        let built = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.workers)
            .thread_name(|i| format!("findz-worker-{i}"))
            .build();
        match built {
            Ok(pool) => {
                tracing::debug!(workers = self.params.workers, "archive worker pool started");
                self.pool = Some(pool);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "worker pool unavailable, listing archives inline");
                self.pool_failed = true;
                false
            }
        }
    }

    fn receive_one(&mut self) {
        match self.rx.recv() {
            Ok(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.absorb(outcome);
            }
            // Walk holds a sender, so this only happens if every worker died
            Err(_) => self.in_flight = 0,
        }
    }

    fn absorb(&mut self, outcome: ArchiveOutcome) {
        if self.stopped {
            return;
        }
        self.current = outcome.archive;
        for error in &outcome.errors {
            self.report(error);
            if self.stopped {
                return;
            }
        }
        for record in outcome.matched {
            self.emit(record);
        }
        self.count_scanned(outcome.scanned);
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(cache) = &self.params.cache
            && let Err(e) = cache.flush()
        {
            tracing::warn!(error = %e, "cache flush failed");
        }
        self.progress(true);
        tracing::debug!(
            scanned = self.stats.scanned,
            matched = self.stats.matched,
            archives = self.stats.archives,
            errors = self.stats.errors,
            "walk finished"
        );
    }
}

impl Iterator for Walk {
    type Item = FileInfo;

    fn next(&mut self) -> Option<FileInfo> {
        if !self.started {
            self.started = true;
            self.progress(false);
        }
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(record);
            }
            if self.stopped {
                self.finish();
                return None;
            }
            if self.in_flight > 0
                && let Ok(outcome) = self.rx.try_recv()
            {
                self.in_flight -= 1;
                self.absorb(outcome);
            } else if let Some(dir) = self.dirs.pop() {
                self.enumerate(dir);
            } else if let Some(root) = self.roots.pop_front() {
                self.current.clone_from(&root);
                self.visit(root);
            } else if !self.batch.is_empty() {
                self.flush_batch();
            } else if self.in_flight > 0 {
                self.receive_one();
            } else {
                self.finish();
                return None;
            }
        }
    }
}

impl Drop for Walk {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
