//! Run summary formatters.
//!
//! This module renders a finished run for the terminal:
//! - Text for people
//! - JSON for automation and scripting
//!
//! Both formats combine the [`RunReport`] with a few read-only queries
//! against the store ([`StoreTotals`]).
//!
//! # Example
//!
//! ```no_run
//! use dupindex::output::{StoreTotals, TextOutput};
//! use dupindex::pipeline::{Indexer, IndexerConfig};
//! use dupindex::store::Store;
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("./data/db.sq3")).unwrap();
//! let (report, store) = Indexer::new(IndexerConfig::default()).run(Path::new("."), store).unwrap();
//! let totals = StoreTotals::query(&store).unwrap();
//! TextOutput::new(&report, &totals).write_to(&mut std::io::stdout()).unwrap();
//! ```

pub mod json;
pub mod text;

use serde::Serialize;

use crate::store::{Store, StoreResult};

pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;

/// Totals read back from the store after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTotals {
    /// Where the store lives
    pub location: String,
    /// Rows in `files`
    pub total_files: u64,
    /// Rows whose content was seen more than once
    pub duplicated_fingerprints: u64,
}

impl StoreTotals {
    /// Query the store.
    ///
    /// # Errors
    ///
    /// Returns the storage error if a count fails.
    pub fn query(store: &Store) -> StoreResult<Self> {
        Ok(Self {
            location: store.location().to_string(),
            total_files: store.file_count()?,
            duplicated_fingerprints: store.duplicated_fingerprint_count()?,
        })
    }
}
