//! Per-run reconciliation state.
//!
//! A [`RunContext`] is created once per indexing run and shared by the
//! walker thread and every worker. It replaces any process-wide mutable
//! state: two runs in one process never see each other's sets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Sets of paths observed during one run.
#[derive(Debug, Default)]
pub struct RunContext {
    enqueued: Mutex<HashSet<PathBuf>>,
    processed: Mutex<HashSet<PathBuf>>,
    bytes_hashed: AtomicU64,
}

impl RunContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the walker handed `path` to the dispatcher.
    pub fn record_enqueued(&self, path: &Path) {
        lock(&self.enqueued).insert(path.to_path_buf());
    }

    /// Record that `path` was fingerprinted and its record submitted.
    pub fn record_processed(&self, path: &Path, bytes: u64) {
        lock(&self.processed).insert(path.to_path_buf());
        self.bytes_hashed.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Number of distinct enqueued paths so far.
    #[must_use]
    pub fn enqueued_count(&self) -> usize {
        lock(&self.enqueued).len()
    }

    /// Number of distinct processed paths so far.
    #[must_use]
    pub fn processed_count(&self) -> usize {
        lock(&self.processed).len()
    }

    /// Total bytes fed through the fingerprinter.
    #[must_use]
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed.load(Ordering::Relaxed)
    }

    /// Compute sorted listings and the set difference.
    ///
    /// Call after all workers have finished; earlier calls see a partial run.
    #[must_use]
    pub fn reconcile(&self) -> Reconciliation {
        let enqueued = lock(&self.enqueued);
        let processed = lock(&self.processed);

        let mut missing: Vec<PathBuf> = enqueued.difference(&processed).cloned().collect();
        missing.sort();

        Reconciliation {
            enqueued: sorted(&enqueued),
            processed: sorted(&processed),
            missing,
        }
    }
}

/// Snapshot of a finished run's path sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Every path the walker yielded
    pub enqueued: Vec<PathBuf>,
    /// Every path that reached the batch writer
    pub processed: Vec<PathBuf>,
    /// `enqueued - processed`
    pub missing: Vec<PathBuf>,
}

impl Reconciliation {
    /// `|enqueued| - |processed|`, saturating at zero.
    #[must_use]
    pub fn difference(&self) -> usize {
        self.enqueued.len().saturating_sub(self.processed.len())
    }
}

fn sorted(set: &HashSet<PathBuf>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = set.iter().cloned().collect();
    paths.sort();
    paths
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
