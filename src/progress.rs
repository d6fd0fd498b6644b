//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display a live spinner on stderr while a run is indexing. The caller
//! decides whether to install it at all (quiet runs and non-terminals get none).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress callback for an indexing run.
///
/// Walking and hashing overlap, so there is no known total up front.
/// Implementations receive running counts instead.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g., "indexing")
    /// * `total` - Total number of items, or 0 if unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called each time the walker hands a path to the workers.
    ///
    /// # Arguments
    ///
    /// * `enqueued` - Paths enqueued so far
    fn on_enqueued(&self, _enqueued: usize) {}

    /// Called for each file fingerprinted.
    ///
    /// # Arguments
    ///
    /// * `current` - Files completed so far (1-based)
    /// * `path` - Path just completed
    fn on_progress(&self, current: usize, path: &str);

    /// Called after each batch flush.
    ///
    /// # Arguments
    ///
    /// * `records` - Records in the flushed batch
    fn on_flush(&self, _records: usize) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif.
#[derive(Default)]
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    enqueued: AtomicUsize,
    flushed: AtomicU64,
}

impl Progress {
    /// Create a new progress reporter. Nothing is drawn until a phase starts.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupindex::progress::Progress;
    ///
    /// let progress = Progress::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} {msg} [{elapsed_precise}] {pos} files {per_sec}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn status(&self) -> String {
        format!(
            "Indexing (queued {}, flushed {})",
            self.enqueued.load(Ordering::Relaxed),
            self.flushed.load(Ordering::Relaxed)
        )
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(ref pb) = *guard {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        let pb = ProgressBar::new_spinner();
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(Self::style());
        pb.set_message(phase.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    fn on_enqueued(&self, enqueued: usize) {
        self.enqueued.store(enqueued, Ordering::Relaxed);
    }

    fn on_progress(&self, current: usize, path: &str) {
        let msg = format!("{} {}", self.status(), truncate_path(path, 30));
        self.with_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(msg);
        });
    }

    fn on_flush(&self, records: usize) {
        self.flushed.fetch_add(records as u64, Ordering::Relaxed);
    }

    fn on_phase_end(&self, _phase: &str) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.finish_with_message(format!(
                    "Indexing complete ({} queued)",
                    self.enqueued.load(Ordering::Relaxed)
                ));
            }
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len >= max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
