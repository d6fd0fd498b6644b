//! Command-line interface definitions.
//!
//! Every flag here overrides the matching configuration key; anything not
//! given on the command line falls through to the environment, the config
//! file, and finally the built-in defaults.
//!
//! # Example
//!
//! ```bash
//! # Index a folder with the defaults (8 workers, batches of 1000)
//! dupindex /mnt/photos
//!
//! # Sequential run into a specific database
//! dupindex /mnt/photos --mode single --db ./photos.sq3
//!
//! # Machine-readable summary
//! dupindex /mnt/photos --output json --no-progress
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::Config;
use crate::pipeline::ScanMode;
use crate::scanner::{HashAlgorithm, HiddenPolicy};
use crate::store::BatchFailurePolicy;

/// Index a directory tree into SQLite, recording duplicate content.
///
/// Every eligible file is fingerprinted and stored once per distinct
/// content; later copies bump the first record's update count. A run
/// audit and path listings are written alongside the database.
#[derive(Debug, Parser)]
#[command(name = "dupindex")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "If no PATH is given, the configured default_root is scanned (default \".\").")]
pub struct Cli {
    /// Directory to index
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long = "db", value_name = "FILE")]
    pub db_path: Option<PathBuf>,

    /// Directory for enqueued/processed/missing listings
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Records per database transaction
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Concurrent workers (ignored in single mode)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Paths buffered between the walker and the workers
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Dispatch mode
    #[arg(long, value_enum)]
    pub mode: Option<ScanMode>,

    /// Fingerprint digest
    #[arg(long = "hash", value_enum)]
    pub hash_algorithm: Option<HashAlgorithm>,

    /// Which files count as hidden and are skipped
    #[arg(long = "hidden", value_enum)]
    pub hidden_policy: Option<HiddenPolicy>,

    /// What happens to a batch when one record cannot be stored
    #[arg(long, value_enum)]
    pub batch_failure: Option<BatchFailurePolicy>,

    /// Keep existing records instead of starting a fresh dataset
    #[arg(long)]
    pub resume: bool,

    /// Do not draw the progress indicator
    #[arg(long)]
    pub no_progress: bool,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Print fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

/// Run summary format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// A single JSON object
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl Cli {
    /// Overlay command-line values on a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref db) = self.db_path {
            config.db_path.clone_from(db);
        }
        if let Some(ref dir) = self.data_dir {
            config.data_dir.clone_from(dir);
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.workers {
            config.workers = n;
        }
        if let Some(n) = self.queue_capacity {
            config.queue_capacity = n;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(algorithm) = self.hash_algorithm {
            config.hash_algorithm = algorithm;
        }
        if let Some(policy) = self.hidden_policy {
            config.hidden_policy = policy;
        }
        if let Some(policy) = self.batch_failure {
            config.batch_failure = policy;
        }
    }

    /// The directory to scan: the positional argument or the configured default.
    #[must_use]
    pub fn scan_root(&self, config: &Config) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| config.default_root.clone())
    }
}
