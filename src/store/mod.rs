//! Persistent store for fingerprinted files and run audit entries.
//!
//! The store is a SQLite database with two tables:
//!
//! * `files`: one row per distinct content fingerprint. The `UNIQUE`
//!   constraint on `hash` is what detects duplicates: a colliding insert is
//!   turned into an `updateCount` increment on the existing row.
//! * `audit`: one row per run fact (`scanFolder`, `startTime`, totals, ...),
//!   written as upserts so reruns overwrite instead of piling up.
//!
//! Column names are camelCase because external read-only consumers query
//! the tables directly.

pub mod database;
pub mod models;

pub use database::{
    BatchFailurePolicy, BatchOutcome, FailedRecord, Store, StoreError, StoreResult,
};
pub use models::{format_timestamp, AuditEntry, FileRecord, InsertOutcome};
