//! Batched, serialized writes to the store.
//!
//! Workers push records into a shared pending buffer. The push that fills
//! the buffer takes it and flushes it synchronously, so that worker does
//! not pick up another file until its batch is committed. Every flush goes
//! through one gate (the mutex around the [`Store`]), so at most one
//! transaction is ever open.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::progress::ProgressCallback;
use crate::store::{BatchFailurePolicy, FileRecord, Store};

/// Default number of records per flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Counters for every flush of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushStats {
    /// Number of flushes executed
    pub flushes: usize,
    /// Record count of each flush, in execution order
    pub flush_sizes: Vec<usize>,
    /// Rows created
    pub inserted: u64,
    /// Records resolved as duplicates (`updateCount` bumps)
    pub duplicates: u64,
    /// Records lost to storage errors
    pub failed: u64,
    /// Flushes whose transaction rolled back entirely
    pub failed_batches: usize,
    /// Paths of records lost to storage errors
    pub failed_paths: Vec<String>,
    /// Highest number of flush transactions executing at once
    pub peak_concurrent_flushes: usize,
}

/// Accumulates records and flushes them in fixed-size transactions.
pub struct BatchWriter {
    pending: Mutex<Vec<FileRecord>>,
    gate: Mutex<Store>,
    stats: Mutex<FlushStats>,
    active_flushes: AtomicUsize,
    batch_size: usize,
    policy: BatchFailurePolicy,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for BatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWriter")
            .field("batch_size", &self.batch_size)
            .field("policy", &self.policy)
            .field("pending", &lock(&self.pending).len())
            .finish_non_exhaustive()
    }
}

impl BatchWriter {
    /// Wrap `store` with a writer that flushes every `batch_size` records (minimum 1).
    #[must_use]
    pub fn new(store: Store, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pending: Mutex::new(Vec::with_capacity(batch_size)),
            gate: Mutex::new(store),
            stats: Mutex::new(FlushStats::default()),
            active_flushes: AtomicUsize::new(0),
            batch_size,
            policy: BatchFailurePolicy::default(),
            progress: None,
        }
    }

    /// Set how record-level storage failures are handled.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: BatchFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report each committed flush to `callback`.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records waiting for the next flush.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Add one record; flushes on the calling thread when the batch is full.
    pub fn push(&self, record: FileRecord) {
        let full = {
            let mut pending = lock(&self.pending);
            pending.push(record);
            if pending.len() >= self.batch_size {
                Some(std::mem::replace(
                    &mut *pending,
                    Vec::with_capacity(self.batch_size),
                ))
            } else {
                None
            }
        };

        if let Some(batch) = full {
            self.flush(batch);
        }
    }

    /// Flush whatever remains and hand back the store with the run's flush stats.
    ///
    /// An empty remainder is skipped rather than committed as an empty transaction.
    #[must_use]
    pub fn finish(self) -> (Store, FlushStats) {
        let remainder = std::mem::take(&mut *lock(&self.pending));
        if remainder.is_empty() {
            log::debug!("Final flush skipped: nothing pending");
        } else {
            log::debug!("Final flush of {} records", remainder.len());
            self.flush(remainder);
        }

        let store = self.gate.into_inner().unwrap_or_else(PoisonError::into_inner);
        let stats = self.stats.into_inner().unwrap_or_else(PoisonError::into_inner);
        (store, stats)
    }

    fn flush(&self, batch: Vec<FileRecord>) {
        let size = batch.len();
        let mut store = lock(&self.gate);
        let concurrent = self.active_flushes.fetch_add(1, Ordering::SeqCst) + 1;

        let result = store.insert_batch(&batch, self.policy);

        self.active_flushes.fetch_sub(1, Ordering::SeqCst);

        let mut stats = lock(&self.stats);
        stats.flushes += 1;
        stats.flush_sizes.push(size);
        stats.peak_concurrent_flushes = stats.peak_concurrent_flushes.max(concurrent);

        match result {
            Ok(outcome) => {
                log::debug!(
                    "Flushed {} records: {} inserted, {} duplicates, {} failed",
                    size,
                    outcome.inserted,
                    outcome.duplicates,
                    outcome.failed.len()
                );
                stats.inserted += outcome.inserted as u64;
                stats.duplicates += outcome.duplicates as u64;
                stats.failed += outcome.failed.len() as u64;
                stats
                    .failed_paths
                    .extend(outcome.failed.into_iter().map(|f| f.full_path));
            }
            Err(e) => {
                log::error!("Batch of {} records rolled back: {}", size, e);
                stats.failed += size as u64;
                stats.failed_batches += 1;
                stats
                    .failed_paths
                    .extend(batch.into_iter().map(|r| r.full_path));
            }
        }
        drop(stats);
        drop(store);

        if let Some(ref cb) = self.progress {
            cb.on_flush(size);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
