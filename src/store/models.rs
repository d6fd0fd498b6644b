//! Row types persisted in the store.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::Fingerprint;

/// One row of the `files` table: the first sighting of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Base name of the file
    pub file_name: String,
    /// Absolute path (unique)
    pub full_path: String,
    /// Lowercased extension without the dot, empty if none
    pub file_format: String,
    /// Size in bytes
    pub file_size: u64,
    /// Hex content fingerprint (unique)
    pub hash: String,
    /// When this run fingerprinted the file (RFC 3339, UTC)
    pub indexed_at: String,
    /// Filesystem creation time, falling back to modification time
    pub created_at: String,
    /// Filesystem modification time
    pub modified_at: String,
    /// Number of later duplicate sightings
    pub update_count: u64,
}

impl FileRecord {
    /// Build a candidate record from a fingerprinted file.
    ///
    /// Paths are stored as UTF-8. A path that is not valid UTF-8 is stored
    /// with replacement characters and a warning is logged; two such paths
    /// differing only in their invalid bytes share one `fullPath`.
    #[must_use]
    pub fn new(
        path: &Path,
        metadata: &Metadata,
        fingerprint: Fingerprint,
        indexed_at: DateTime<Utc>,
    ) -> Self {
        if path.to_str().is_none() {
            log::warn!("Path is not valid UTF-8, storing lossily: {}", path.display());
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let created = metadata.created().unwrap_or(modified);

        Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            full_path: path.to_string_lossy().into_owned(),
            file_format: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            file_size: metadata.len(),
            hash: fingerprint.to_hex(),
            indexed_at: format_timestamp(indexed_at),
            created_at: format_timestamp(created.into()),
            modified_at: format_timestamp(modified.into()),
            update_count: 0,
        }
    }

    /// The stored path as a [`PathBuf`].
    #[must_use]
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.full_path)
    }
}

/// One row of the `audit` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique key, e.g. `scanFolder`
    pub audit_key: String,
    /// Value as text
    pub audit_value: String,
    /// Number of times the key was rewritten
    pub update_count: u64,
}

/// Result of offering one record to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created.
    Inserted,
    /// The fingerprint (or path) already existed; its `updateCount` was bumped.
    Duplicate,
}

/// Format a timestamp the way every text timestamp in the store is written.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
