//! JSON output formatter for run summaries.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "run": {
//!     "scanRoot": "/data/photos",
//!     "mode": "concurrent, 8 workers",
//!     "enqueuedTotal": 1200,
//!     "filesProcessed": 1200,
//!     "filesSkipped": 37,
//!     "missingFiles": 0,
//!     "...": "..."
//!   },
//!   "store": {
//!     "location": "./data/db.sq3",
//!     "totalFiles": 1163,
//!     "duplicatedFingerprints": 21
//!   },
//!   "exitCode": 0,
//!   "exitCodeName": "DI000"
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use super::StoreTotals;
use crate::error::ExitCode;
use crate::pipeline::RunReport;

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonOutput<'a> {
    /// The run summary
    pub run: &'a RunReport,
    /// Totals read back from the store
    pub store: &'a StoreTotals,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DI000")
    pub exit_code_name: &'static str,
}

impl<'a> JsonOutput<'a> {
    /// Create a new JSON output.
    #[must_use]
    pub fn new(run: &'a RunReport, store: &'a StoreTotals, exit_code: ExitCode) -> Self {
        Self {
            run,
            store,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
