//! Layered configuration.
//!
//! Values are merged with figment, later layers winning:
//! defaults < TOML file < environment < CLI flags.
//!
//! The TOML file is `--config PATH` if given, else `config.toml` in the
//! platform config directory. Environment variables use the `DUPINDEX_`
//! prefix (`DUPINDEX_BATCH_SIZE=500`); the bare `DB_PATH` and
//! `BATCH_SIZE` variables are also honored, below the prefixed ones.
//! CLI flags are applied by the caller after [`Config::load`].

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{IndexerConfig, ScanMode, DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::scanner::{
    HashAlgorithm, HiddenPolicy, WalkerConfig, DEFAULT_IGNORE_EXTENSIONS, DEFAULT_IGNORE_NAMES,
};
use crate::store::BatchFailurePolicy;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DUPINDEX_";

/// Unprefixed variables accepted for compatibility with older deployments.
pub const LEGACY_ENV_KEYS: &[&str] = &["DB_PATH", "BATCH_SIZE"];

/// Configuration errors. These map to the usage exit code.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong types.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Values parsed but are not usable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Directory for `enqueued.txt`, `processed.txt`, `missing.txt`
    pub data_dir: PathBuf,
    /// Records per flush
    pub batch_size: usize,
    /// Worker count in concurrent mode
    pub workers: usize,
    /// Paths buffered between walker and workers
    pub queue_capacity: usize,
    /// Concurrent or single
    pub mode: ScanMode,
    /// Fingerprint digest
    pub hash_algorithm: HashAlgorithm,
    /// Which entries count as hidden
    pub hidden_policy: HiddenPolicy,
    /// Entry names to skip with their subtrees
    pub ignore_names: Vec<String>,
    /// File extensions to skip
    pub ignore_extensions: Vec<String>,
    /// Handling of record-level storage errors
    pub batch_failure: BatchFailurePolicy,
    /// Scan root used when none is given on the command line
    pub default_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/db.sq3"),
            data_dir: PathBuf::from("./data"),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            mode: ScanMode::default(),
            hash_algorithm: HashAlgorithm::default(),
            hidden_policy: HiddenPolicy::default(),
            ignore_names: DEFAULT_IGNORE_NAMES.iter().map(|s| (*s).to_string()).collect(),
            ignore_extensions: DEFAULT_IGNORE_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            batch_failure: BatchFailurePolicy::default(),
            default_root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load and validate the configuration.
    ///
    /// With `config_path` set, that file must exist. Without it, the
    /// platform config file is used if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer fails to parse or validation fails.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path(),
        };

        if let Some(ref path) = file {
            log::debug!("Loading configuration from {}", path.display());
        }

        let config: Self = Self::figment(file.as_deref())
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the layered figment without extracting it.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::raw().only(LEGACY_ENV_KEYS))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Platform config file: `<config dir>/dupindex/config.toml`.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupindex").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check values that parse but cannot drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self
            .ignore_extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').is_empty())
        {
            return Err(ConfigError::Invalid(
                "ignore_extensions entries must not be empty".into(),
            ));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path must not be empty".into()));
        }
        Ok(())
    }

    /// Walker filters described by this configuration.
    ///
    /// Extensions given without a leading dot get one.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        let extensions = self
            .ignore_extensions
            .iter()
            .map(|ext| {
                if ext.starts_with('.') {
                    ext.clone()
                } else {
                    format!(".{ext}")
                }
            })
            .collect();

        WalkerConfig::default()
            .with_ignore_names(self.ignore_names.clone())
            .with_ignore_extensions(extensions)
            .with_hidden_policy(self.hidden_policy)
    }

    /// Pipeline settings described by this configuration.
    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig::default()
            .with_walker(self.walker_config())
            .with_hash_algorithm(self.hash_algorithm)
            .with_mode(self.mode)
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
            .with_batch_size(self.batch_size)
            .with_batch_failure(self.batch_failure)
            .with_listing_dir(self.data_dir.clone())
    }
}
