//! Indexing pipeline: walk, fingerprint, batch, reconcile.
//!
//! # Overview
//!
//! One [`Indexer::run`] performs a full pass over a directory tree:
//! 1. **Walk**: the [`Walker`] yields eligible files lazily on the calling thread
//! 2. **Dispatch**: a [`Dispatcher`] feeds them to a fixed number of workers
//! 3. **Fingerprint**: each worker hashes one file and builds a [`FileRecord`]
//! 4. **Batch**: records are committed in serialized transactions by the [`BatchWriter`]
//! 5. **Reconcile**: enqueued and processed sets are compared and audited
//!
//! # Example
//!
//! ```no_run
//! use dupindex::pipeline::{Indexer, IndexerConfig};
//! use dupindex::store::Store;
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("./data/db.sq3")).unwrap();
//! let indexer = Indexer::new(IndexerConfig::default().with_workers(4));
//! let (report, _store) = indexer.run(Path::new("."), store).unwrap();
//! println!("{} files, {} duplicates", report.files_processed, report.files_skipped);
//! ```

pub mod batch;
pub mod context;
pub mod dispatcher;

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditReporter, RunStart};
use crate::progress::ProgressCallback;
use crate::scanner::walker::WalkStats;
use crate::scanner::{HashAlgorithm, HashError, Hasher, Walker, WalkerConfig};
use crate::store::{BatchFailurePolicy, FileRecord, Store, StoreError};

pub use batch::{BatchWriter, FlushStats, DEFAULT_BATCH_SIZE};
pub use context::{Reconciliation, RunContext};
pub use dispatcher::{DispatchError, DispatchStats, Dispatcher, InFlightGauge, DEFAULT_QUEUE_CAPACITY};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 8;

/// How files are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// A pool of workers
    #[default]
    Concurrent,
    /// One file at a time, in walk order
    Single,
}

impl ScanMode {
    /// Worker count this mode actually uses.
    #[must_use]
    pub fn effective_workers(self, configured: usize) -> usize {
        match self {
            Self::Concurrent => configured.max(1),
            Self::Single => 1,
        }
    }

    /// Label written to the `mode` audit entry.
    #[must_use]
    pub fn label(self, configured: usize) -> String {
        match self {
            Self::Concurrent => format!("concurrent, {} workers", configured.max(1)),
            Self::Single => "single".to_string(),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concurrent => write!(f, "concurrent"),
            Self::Single => write!(f, "single"),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The scan root does not exist.
    #[error("Scan root not found: {0}")]
    RootNotFound(PathBuf),

    /// The scan root is not a directory.
    #[error("Scan root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The scan root exists but cannot be inspected.
    #[error("Cannot access scan root {path}: {source}")]
    RootAccess {
        /// The root as given
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The store could not be prepared for the run.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The worker pool could not start.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Errors for a single file. Logged and counted, never fatal.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Metadata could not be read.
    #[error("Cannot stat {path}: {source}")]
    Metadata {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The content could not be fingerprinted.
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Configuration for an indexing run.
#[derive(Clone)]
pub struct IndexerConfig {
    /// Walker filters
    pub walker: WalkerConfig,
    /// Fingerprint digest
    pub hash_algorithm: HashAlgorithm,
    /// Concurrent or single
    pub mode: ScanMode,
    /// Worker count in concurrent mode
    pub workers: usize,
    /// Paths buffered between walker and workers
    pub queue_capacity: usize,
    /// Records per flush
    pub batch_size: usize,
    /// Handling of record-level storage errors
    pub batch_failure: BatchFailurePolicy,
    /// Keep existing records instead of clearing the store first
    pub resume: bool,
    /// Where to write `enqueued.txt`, `processed.txt`, `missing.txt`
    pub listing_dir: Option<PathBuf>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for IndexerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerConfig")
            .field("walker", &self.walker)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("mode", &self.mode)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("batch_size", &self.batch_size)
            .field("batch_failure", &self.batch_failure)
            .field("resume", &self.resume)
            .field("listing_dir", &self.listing_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            walker: WalkerConfig::default(),
            hash_algorithm: HashAlgorithm::default(),
            mode: ScanMode::default(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_failure: BatchFailurePolicy::default(),
            resume: false,
            listing_dir: None,
            progress_callback: None,
        }
    }
}

impl IndexerConfig {
    /// Set the walker filters.
    #[must_use]
    pub fn with_walker(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    /// Set the fingerprint digest.
    #[must_use]
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Set the dispatch mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the worker count (minimum 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the walker-to-worker queue capacity (minimum 1).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the flush size (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the record failure policy.
    #[must_use]
    pub fn with_batch_failure(mut self, policy: BatchFailurePolicy) -> Self {
        self.batch_failure = policy;
        self
    }

    /// Keep the store's existing contents.
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Write path listings into `dir`.
    #[must_use]
    pub fn with_listing_dir(mut self, dir: PathBuf) -> Self {
        self.listing_dir = Some(dir);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Workers actually spawned for the configured mode.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.mode.effective_workers(self.workers)
    }
}

/// Summary of one finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Absolute scan root
    pub scan_root: PathBuf,
    /// Mode label, as audited
    pub mode: String,
    /// Workers spawned
    pub workers: usize,
    /// Records per flush
    pub batch_size: usize,
    /// Fingerprint digest
    pub hash_algorithm: HashAlgorithm,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub finished_at: DateTime<Utc>,
    /// Seconds between start and end
    pub elapsed_secs: f64,
    /// Paths yielded by the walker
    pub enqueued_total: u64,
    /// Paths fingerprinted and submitted
    pub files_processed: u64,
    /// `enqueued_total - files_processed`
    pub difference: u64,
    /// Duplicate sightings (`updateCount` bumps)
    pub files_skipped: u64,
    /// Paths enqueued but never processed
    pub missing_files: u64,
    /// Files whose metadata or content could not be read
    pub files_failed: u64,
    /// New rows committed
    pub records_stored: u64,
    /// Records lost to storage errors
    pub records_failed: u64,
    /// Bytes read by the fingerprinter
    pub bytes_hashed: u64,
    /// Highest number of files in flight at once
    pub peak_in_flight: usize,
    /// Walker decisions
    pub walk: WalkStats,
    /// Flush counters
    pub flush: FlushStats,
    /// Paths enqueued but never processed, sorted
    pub missing_paths: Vec<PathBuf>,
    /// Audit entries and listings that could not be written
    pub audit_failures: usize,
}

#[cfg(test)]
impl RunReport {
    /// A finished three-file run with one duplicate.
    pub(crate) fn sample() -> Self {
        let now = Utc::now();
        Self {
            scan_root: PathBuf::from("/data"),
            mode: ScanMode::Concurrent.label(DEFAULT_WORKERS),
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            hash_algorithm: HashAlgorithm::Sha256,
            started_at: now,
            finished_at: now,
            elapsed_secs: 0.25,
            enqueued_total: 3,
            files_processed: 3,
            difference: 0,
            files_skipped: 1,
            missing_files: 0,
            files_failed: 0,
            records_stored: 2,
            records_failed: 0,
            bytes_hashed: 15,
            peak_in_flight: 2,
            walk: WalkStats::default(),
            flush: FlushStats::default(),
            missing_paths: Vec::new(),
            audit_failures: 0,
        }
    }
}

/// Runs the indexing pipeline.
#[derive(Debug, Clone, Default)]
pub struct Indexer {
    config: IndexerConfig,
}

impl Indexer {
    /// Create an indexer.
    #[must_use]
    pub fn new(config: IndexerConfig) -> Self {
        Self { config }
    }

    /// Index every eligible file under `root` into `store`.
    ///
    /// Returns the run summary and the store, so callers can query it.
    ///
    /// # Errors
    ///
    /// Fails only if `root` is not a readable directory, the store cannot
    /// be reset, or the worker pool cannot start. Per-file, per-batch and
    /// audit failures are logged and reflected in the report.
    pub fn run(&self, root: &Path, mut store: Store) -> Result<(RunReport, Store), IndexError> {
        check_root(root)?;

        if self.config.resume {
            log::info!("Resuming into existing store at {}", store.location());
        } else {
            store.reset()?;
        }

        let workers = self.config.effective_workers();
        let mode_label = self.config.mode.label(workers);
        let reporter = match &self.config.listing_dir {
            Some(dir) => AuditReporter::new().with_listing_dir(dir.clone()),
            None => AuditReporter::new(),
        };
        // The store and listings may sit under the root; never index them.
        let walker_config = self
            .config
            .walker
            .clone()
            .with_excluded_paths(store.disk_files().into_iter().chain(reporter.listing_paths()));
        let walker = Walker::new(root, walker_config);
        let scan_root = walker.root().to_path_buf();
        let counters = walker.counters();

        let started_at = Utc::now();
        let timer = Instant::now();
        let algorithm = self.config.hash_algorithm.to_string();
        let mut audit_failures = reporter.write_start(
            &store,
            &RunStart {
                scan_root: &scan_root,
                mode: &mode_label,
                batch_size: self.config.batch_size,
                hash_algorithm: &algorithm,
                started_at,
            },
        );

        log::info!("Indexing {} ({})", scan_root.display(), mode_label);

        let progress = self.config.progress_callback.clone();
        if let Some(ref cb) = progress {
            cb.on_phase_start("indexing", 0);
        }

        let ctx = RunContext::new();
        let hasher = Hasher::with_algorithm(self.config.hash_algorithm);
        let mut writer = BatchWriter::new(store, self.config.batch_size)
            .with_failure_policy(self.config.batch_failure);
        if let Some(ref cb) = progress {
            writer = writer.with_progress_callback(Arc::clone(cb));
        }

        let dispatcher = Dispatcher::new(workers).with_queue_capacity(self.config.queue_capacity);
        let completed = AtomicUsize::new(0);

        let paths = walker.walk().inspect(|path| {
            ctx.record_enqueued(path);
            if let Some(ref cb) = progress {
                cb.on_enqueued(ctx.enqueued_count());
            }
        });

        let dispatch = dispatcher.run(paths, |path| {
            process_file(path, &hasher, &ctx, &writer)?;
            if let Some(ref cb) = progress {
                let n = completed.fetch_add(1, Ordering::Relaxed) + 1;
                cb.on_progress(n, &path.to_string_lossy());
            }
            Ok::<(), ProcessError>(())
        })?;

        let (store, flush) = writer.finish();
        if let Some(ref cb) = progress {
            cb.on_phase_end("indexing");
        }

        let reconciliation = ctx.reconcile();
        let finished_at = Utc::now();
        let enqueued_total = reconciliation.enqueued.len() as u64;
        let files_processed = reconciliation.processed.len() as u64;

        let mut report = RunReport {
            scan_root,
            mode: mode_label,
            workers,
            batch_size: self.config.batch_size,
            hash_algorithm: self.config.hash_algorithm,
            started_at,
            finished_at,
            elapsed_secs: timer.elapsed().as_secs_f64(),
            enqueued_total,
            files_processed,
            difference: reconciliation.difference() as u64,
            files_skipped: flush.duplicates,
            missing_files: reconciliation.missing.len() as u64,
            files_failed: dispatch.failed,
            records_stored: flush.inserted,
            records_failed: flush.failed,
            bytes_hashed: ctx.bytes_hashed(),
            peak_in_flight: dispatch.peak_in_flight,
            walk: counters.snapshot(),
            flush,
            missing_paths: reconciliation.missing.clone(),
            audit_failures: 0,
        };

        audit_failures += reporter.write_final(&store, &report);
        audit_failures += reporter.write_listings(&reconciliation);
        report.audit_failures = audit_failures;

        if audit_failures > 0 {
            log::warn!("{} audit writes failed", audit_failures);
        }
        log::info!(
            "Indexed {} of {} files in {:.2}s: {} stored, {} duplicates, {} missing",
            report.files_processed,
            report.enqueued_total,
            report.elapsed_secs,
            report.records_stored,
            report.files_skipped,
            report.missing_files
        );

        Ok((report, store))
    }
}

/// Fingerprint one file and hand its record to the writer.
///
/// The path is marked processed before the record is submitted; a later
/// storage failure shows up in the flush counters, not in `missing`.
///
/// # Errors
///
/// Returns [`ProcessError`] if the file cannot be inspected or read.
pub fn process_file(
    path: &Path,
    hasher: &Hasher,
    ctx: &RunContext,
    writer: &BatchWriter,
) -> Result<(), ProcessError> {
    let metadata = fs::symlink_metadata(path).map_err(|source| ProcessError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;
    let fingerprint = hasher.hash_file(path)?;
    let record = FileRecord::new(path, &metadata, fingerprint, Utc::now());

    ctx.record_processed(path, metadata.len());
    writer.push(record);
    Ok(())
}

fn check_root(root: &Path) -> Result<(), IndexError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(IndexError::NotADirectory(root.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(IndexError::RootNotFound(root.to_path_buf())),
        Err(source) => Err(IndexError::RootAccess {
            path: root.to_path_buf(),
            source,
        }),
    }
}
