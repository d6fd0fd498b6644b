//! Bounded worker pool.
//!
//! The walker runs on the calling thread and feeds a bounded channel.
//! Exactly `workers` loops drain it on a dedicated rayon pool, so at most
//! `workers` tasks are ever in flight and tasks start in the order the
//! walker produced them. A failing task is logged and counted; it never
//! stops the pool.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::Receiver;
use serde::Serialize;
use thiserror::Error;

/// Default capacity of the path queue between walker and workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Errors that prevent the pool from running at all.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker threads could not be spawned.
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Tracks how many tasks are executing right now and the highest value seen.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    /// Mark one task as started. The slot is released when the guard drops.
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    /// Tasks currently executing.
    #[must_use]
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest concurrent task count observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Releases an in-flight slot on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counters for one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Paths handed to the pool
    pub dispatched: u64,
    /// Tasks that returned `Ok`
    pub succeeded: u64,
    /// Tasks that returned `Err`
    pub failed: u64,
    /// Highest number of tasks executing at once
    pub peak_in_flight: usize,
}

/// Runs a per-path task on a fixed number of workers.
#[derive(Debug)]
pub struct Dispatcher {
    workers: usize,
    queue_capacity: usize,
    gauge: InFlightGauge,
}

impl Dispatcher {
    /// Create a dispatcher with `workers` concurrent slots (minimum 1).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            gauge: InFlightGauge::default(),
        }
    }

    /// Set how many paths may wait between walker and workers (minimum 1).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Number of worker slots.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Live view of in-flight tasks.
    #[must_use]
    pub fn gauge(&self) -> &InFlightGauge {
        &self.gauge
    }

    /// Feed every path from `paths` through `task`.
    ///
    /// `paths` is consumed on the calling thread; it blocks whenever the
    /// queue is full. Returns once the iterator is exhausted and every
    /// admitted task has finished.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Pool`] if the worker threads cannot be created.
    /// Task failures are not errors; they are counted in [`DispatchStats::failed`].
    pub fn run<I, F, E>(&self, paths: I, task: F) -> Result<DispatchStats, DispatchError>
    where
        I: IntoIterator<Item = PathBuf>,
        F: Fn(&Path) -> Result<(), E> + Sync,
        E: Display,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("dupindex-worker-{i}"))
            .build()?;

        let (tx, rx) = crossbeam_channel::bounded::<PathBuf>(self.queue_capacity);
        let succeeded = AtomicU64::new(0);
        let failed = AtomicU64::new(0);
        let mut dispatched = 0u64;

        log::debug!(
            "Dispatching with {} workers, queue capacity {}",
            self.workers,
            self.queue_capacity
        );

        pool.in_place_scope(|scope| {
            for _ in 0..self.workers {
                let rx = rx.clone();
                let task = &task;
                let gauge = &self.gauge;
                let succeeded = &succeeded;
                let failed = &failed;
                scope.spawn(move |_| worker_loop(&rx, task, gauge, succeeded, failed));
            }
            drop(rx);

            for path in paths {
                if tx.send(path).is_err() {
                    log::error!("All workers exited early; stopping dispatch");
                    break;
                }
                dispatched += 1;
            }
            drop(tx);
        });

        let stats = DispatchStats {
            dispatched,
            succeeded: succeeded.into_inner(),
            failed: failed.into_inner(),
            peak_in_flight: self.gauge.peak(),
        };
        log::debug!(
            "Dispatch complete: {} dispatched, {} failed, peak in flight {}",
            stats.dispatched,
            stats.failed,
            stats.peak_in_flight
        );
        Ok(stats)
    }
}

fn worker_loop<F, E>(
    rx: &Receiver<PathBuf>,
    task: &F,
    gauge: &InFlightGauge,
    succeeded: &AtomicU64,
    failed: &AtomicU64,
) where
    F: Fn(&Path) -> Result<(), E>,
    E: Display,
{
    for path in rx.iter() {
        let _slot = gauge.enter();
        match task(&path) {
            Ok(()) => {
                succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                log::warn!("Failed to process {}: {}", path.display(), e);
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
