//! Run audit: key/value entries in the store plus path listings on disk.
//!
//! Nothing here is fatal. A failed entry or listing is logged, counted,
//! and the rest are still attempted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::pipeline::{Reconciliation, RunReport};
use crate::store::{format_timestamp, Store};

/// Audit keys written by every run.
pub mod keys {
    /// Absolute scan root
    pub const SCAN_FOLDER: &str = "scanFolder";
    /// `concurrent, N workers` or `single`
    pub const MODE: &str = "mode";
    /// Run start (RFC 3339)
    pub const START_TIME: &str = "startTime";
    /// Run end (RFC 3339)
    pub const END_TIME: &str = "endTime";
    /// Seconds, two decimals
    pub const ELAPSED_TIME: &str = "elapsedTime";
    /// Paths yielded by the walker
    pub const ENQUEUED_TOTAL: &str = "enqueuedTotal";
    /// Paths fingerprinted and submitted
    pub const FILES_PROCESSED: &str = "filesProcessed";
    /// `enqueuedTotal - filesProcessed`
    pub const DIFFERENCE: &str = "difference";
    /// Duplicate sightings resolved as `updateCount` bumps
    pub const FILES_SKIPPED: &str = "filesSkipped";
    /// Size of `enqueued - processed`
    pub const MISSING_FILES: &str = "missingFiles";
    /// Records committed as new rows
    pub const RECORDS_STORED: &str = "recordsStored";
    /// Records lost to storage errors
    pub const RECORDS_FAILED: &str = "recordsFailed";
    /// Configured flush size
    pub const BATCH_SIZE: &str = "batchSize";
    /// Fingerprint digest
    pub const HASH_ALGORITHM: &str = "hashAlgorithm";
}

/// File name of the enqueued-paths listing.
pub const ENQUEUED_LISTING: &str = "enqueued.txt";
/// File name of the processed-paths listing.
pub const PROCESSED_LISTING: &str = "processed.txt";
/// File name of the missing-paths listing.
pub const MISSING_LISTING: &str = "missing.txt";

const LISTINGS: [&str; 3] = [ENQUEUED_LISTING, PROCESSED_LISTING, MISSING_LISTING];

/// Facts known before the walk starts.
#[derive(Debug, Clone)]
pub struct RunStart<'a> {
    /// Absolute scan root
    pub scan_root: &'a Path,
    /// Rendered mode label
    pub mode: &'a str,
    /// Configured flush size
    pub batch_size: usize,
    /// Fingerprint digest name
    pub hash_algorithm: &'a str,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
}

/// Writes audit entries and listings for one run.
#[derive(Debug, Clone, Default)]
pub struct AuditReporter {
    listing_dir: Option<PathBuf>,
}

impl AuditReporter {
    /// A reporter that only writes store entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write `enqueued.txt`, `processed.txt` and `missing.txt` into `dir`.
    #[must_use]
    pub fn with_listing_dir(mut self, dir: PathBuf) -> Self {
        self.listing_dir = Some(dir);
        self
    }

    /// Paths of the three listings, or none without a listing directory.
    #[must_use]
    pub fn listing_paths(&self) -> Vec<PathBuf> {
        self.listing_dir
            .as_deref()
            .map(|dir| LISTINGS.iter().map(|name| dir.join(name)).collect())
            .unwrap_or_default()
    }

    /// Write the entries known at startup. Returns the number of failed writes.
    pub fn write_start(&self, store: &Store, start: &RunStart<'_>) -> usize {
        let entries = [
            (keys::SCAN_FOLDER, start.scan_root.display().to_string()),
            (keys::MODE, start.mode.to_string()),
            (keys::BATCH_SIZE, start.batch_size.to_string()),
            (keys::HASH_ALGORITHM, start.hash_algorithm.to_string()),
            (keys::START_TIME, format_timestamp(start.started_at)),
        ];
        write_entries(store, &entries)
    }

    /// Write the end-of-run entries. Returns the number of failed writes.
    pub fn write_final(&self, store: &Store, report: &RunReport) -> usize {
        let entries = [
            (keys::END_TIME, format_timestamp(report.finished_at)),
            (keys::ELAPSED_TIME, format!("{:.2}", report.elapsed_secs)),
            (keys::ENQUEUED_TOTAL, report.enqueued_total.to_string()),
            (keys::FILES_PROCESSED, report.files_processed.to_string()),
            (keys::DIFFERENCE, report.difference.to_string()),
            (keys::FILES_SKIPPED, report.files_skipped.to_string()),
            (keys::MISSING_FILES, report.missing_files.to_string()),
            (keys::RECORDS_STORED, report.records_stored.to_string()),
            (keys::RECORDS_FAILED, report.records_failed.to_string()),
        ];
        write_entries(store, &entries)
    }

    /// Write the three path listings. Returns the number of listings that failed.
    ///
    /// Does nothing when no listing directory is configured.
    pub fn write_listings(&self, reconciliation: &Reconciliation) -> usize {
        let Some(dir) = self.listing_dir.as_deref() else {
            return 0;
        };

        if let Err(e) = fs::create_dir_all(dir) {
            log::warn!("Failed to create listing directory {}: {}", dir.display(), e);
            return 3;
        }

        [
            (ENQUEUED_LISTING, &reconciliation.enqueued),
            (PROCESSED_LISTING, &reconciliation.processed),
            (MISSING_LISTING, &reconciliation.missing),
        ]
        .into_iter()
        .filter(|(name, paths)| !write_listing(&dir.join(name), paths))
        .count()
    }
}

fn write_entries(store: &Store, entries: &[(&str, String)]) -> usize {
    entries
        .iter()
        .filter(|(key, value)| match store.upsert_audit(key, value) {
            Ok(()) => false,
            Err(e) => {
                log::warn!("Failed to write audit entry {key}: {e}");
                true
            }
        })
        .count()
}

fn write_listing(path: &Path, paths: &[PathBuf]) -> bool {
    let body = paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    match fs::write(path, body) {
        Ok(()) => {
            log::debug!("Wrote {} paths to {}", paths.len(), path.display());
            true
        }
        Err(e) => {
            log::warn!("Failed to write listing {}: {}", path.display(), e);
            false
        }
    }
}
