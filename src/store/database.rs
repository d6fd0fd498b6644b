//! SQLite-backed file and audit store.

use std::path::{Path, PathBuf};

use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::models::{AuditEntry, FileRecord, InsertOutcome};

const INSERT_FILE: &str = "INSERT INTO files
     (fileName, fullPath, fileFormat, fileSize, hash, indexedAt, createdAt, modifiedAt)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
const BUMP_BY_HASH: &str = "UPDATE files SET updateCount = updateCount + 1 WHERE hash = ?1";
const BUMP_BY_PATH: &str = "UPDATE files SET updateCount = updateCount + 1 WHERE fullPath = ?1";
const UPSERT_AUDIT: &str = "INSERT INTO audit (auditKey, auditValue) VALUES (?1, ?2)
     ON CONFLICT(auditKey) DO UPDATE
     SET auditValue = excluded.auditValue, updateCount = updateCount + 1";
const FILE_COLUMNS: &str = "fileName, fullPath, fileFormat, fileSize, hash, \
     indexedAt, createdAt, modifiedAt, updateCount";

/// Errors raised by the store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The database file could not be opened or initialized.
    #[error("Failed to open store at {path}: {source}")]
    Open {
        /// Database location
        path: PathBuf,
        /// Underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// The directory holding the database could not be created.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Any other SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// What a batch does when one record fails for a reason other than a
/// duplicate fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BatchFailurePolicy {
    /// Roll back only the failing record; the rest of the batch commits.
    #[default]
    IsolateRecord,
    /// Roll back the whole batch.
    AbortBatch,
}

/// A record that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    /// Path of the rejected record
    pub full_path: String,
    /// Rendered storage error
    pub error: String,
}

/// Tally of one committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows created
    pub inserted: usize,
    /// Records resolved as duplicates
    pub duplicates: usize,
    /// Records rolled back individually
    pub failed: Vec<FailedRecord>,
}

/// Persistent store for file records and run audit entries.
pub struct Store {
    conn: Connection,
    location: String,
    path: Option<PathBuf>,
}

/// Files SQLite keeps next to the database in WAL or rollback mode.
const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("location", &self.location)
            .finish()
    }
}

impl Store {
    /// Open or create the store at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or SQLite cannot open and
    /// initialize the database. This is the only error fatal to a run.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        let store = Self {
            conn,
            location: path.display().to_string(),
            path: Some(path.to_path_buf()),
        };
        store.configure_pragmas().map_err(open_err)?;
        store.init_schema().map_err(open_err)?;
        log::debug!("Opened store at {}", store.location);
        Ok(store)
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Fails if SQLite cannot initialize the schema.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            location: ":memory:".to_string(),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn configure_pragmas(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(include_str!("schema.sql"))
    }

    /// Where the store lives, for messages.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The database file and its SQLite sidecars. Empty for in-memory stores.
    #[must_use]
    pub fn disk_files(&self) -> Vec<PathBuf> {
        let Some(ref path) = self.path else {
            return Vec::new();
        };
        let mut files = vec![path.clone()];
        files.extend(SIDECAR_SUFFIXES.iter().map(|suffix| {
            let mut name = path.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        }));
        files
    }

    /// Remove every file record and audit entry so the run starts clean.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the delete fails.
    pub fn reset(&mut self) -> StoreResult<()> {
        self.conn.execute_batch(
            "BEGIN;
             DELETE FROM files;
             DELETE FROM audit;
             DELETE FROM sqlite_sequence WHERE name IN ('files', 'audit');
             COMMIT;",
        )?;
        log::debug!("Store reset: files and audit cleared");
        Ok(())
    }

    /// Insert a batch in one transaction, converting fingerprint collisions
    /// into `updateCount` increments on the existing record.
    ///
    /// # Errors
    ///
    /// With [`BatchFailurePolicy::AbortBatch`], any non-duplicate failure
    /// rolls the whole batch back and is returned. With
    /// [`BatchFailurePolicy::IsolateRecord`], only failures to begin or
    /// commit the transaction are returned; record failures are reported in
    /// [`BatchOutcome::failed`].
    pub fn insert_batch(
        &mut self,
        records: &[FileRecord],
        policy: BatchFailurePolicy,
    ) -> StoreResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let mut tx = self.conn.transaction()?;

        for record in records {
            let result = match policy {
                BatchFailurePolicy::AbortBatch => Some(insert_or_bump(&tx, record)?),
                BatchFailurePolicy::IsolateRecord => {
                    let sp = tx.savepoint()?;
                    match insert_or_bump(&sp, record) {
                        Ok(result) => {
                            sp.commit()?;
                            Some(result)
                        }
                        Err(e) => {
                            log::warn!("Failed to store {}: {}", record.full_path, e);
                            outcome.failed.push(FailedRecord {
                                full_path: record.full_path.clone(),
                                error: e.to_string(),
                            });
                            None
                        }
                    }
                }
            };

            match result {
                Some(InsertOutcome::Inserted) => outcome.inserted += 1,
                Some(InsertOutcome::Duplicate) => outcome.duplicates += 1,
                None => {}
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// Insert or overwrite one audit entry, bumping its `updateCount` on overwrite.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the write fails.
    pub fn upsert_audit(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn
            .prepare_cached(UPSERT_AUDIT)?
            .execute(params![key, value])?;
        Ok(())
    }

    /// Value of one audit entry.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the query fails.
    pub fn audit_value(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT auditValue FROM audit WHERE auditKey = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// All audit entries in insertion order.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the query fails.
    pub fn audit_entries(&self) -> StoreResult<Vec<AuditEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT auditKey, auditValue, updateCount FROM audit ORDER BY id")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(AuditEntry {
                    audit_key: row.get(0)?,
                    audit_value: row.get(1)?,
                    update_count: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Number of stored file records.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the query fails.
    pub fn file_count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Number of fingerprints that were seen more than once.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the query fails.
    pub fn duplicated_fingerprint_count(&self) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE updateCount > 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// The record holding a fingerprint, if any.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the query fails.
    pub fn file_by_hash(&self, hash: &str) -> StoreResult<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE hash = ?1");
        let record = self
            .conn
            .query_row(&sql, [hash], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// The record stored for a path, if any.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the query fails.
    pub fn file_by_path(&self, full_path: &str) -> StoreResult<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE fullPath = ?1");
        let record = self
            .conn
            .query_row(&sql, [full_path], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Every stored record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns the SQLite error if the query fails.
    pub fn files(&self) -> StoreResult<Vec<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

/// Insert one record, or bump the record it collides with.
fn insert_or_bump(conn: &Connection, record: &FileRecord) -> rusqlite::Result<InsertOutcome> {
    let inserted = conn.prepare_cached(INSERT_FILE)?.execute(params![
        record.file_name,
        record.full_path,
        record.file_format,
        record.file_size as i64,
        record.hash,
        record.indexed_at,
        record.created_at,
        record.modified_at,
    ]);

    match inserted {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(e) if is_unique_violation(&e) => {
            let bumped = conn.prepare_cached(BUMP_BY_HASH)?.execute([&record.hash])?;
            if bumped == 0 {
                // Same path already stored with different content (resumed run).
                conn.prepare_cached(BUMP_BY_PATH)?
                    .execute([&record.full_path])?;
            }
            log::trace!("Duplicate fingerprint {} for {}", record.hash, record.full_path);
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(e),
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        file_name: row.get(0)?,
        full_path: row.get(1)?,
        file_format: row.get(2)?,
        file_size: row.get::<_, i64>(3)? as u64,
        hash: row.get(4)?,
        indexed_at: row.get(5)?,
        created_at: row.get(6)?,
        modified_at: row.get(7)?,
        update_count: row.get::<_, i64>(8)? as u64,
    })
}
