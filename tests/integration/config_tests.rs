use clap::Parser;
use dupindex::cli::Cli;
use dupindex::config::{Config, ConfigError};
use dupindex::pipeline::ScanMode;
use dupindex::scanner::{HashAlgorithm, HiddenPolicy};
use dupindex::store::BatchFailurePolicy;
use figment::providers::Serialized;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tempfile::tempdir;

/// Serializes tests that touch process environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const TOUCHED_VARS: &[&str] = &[
    "DUPINDEX_BATCH_SIZE",
    "DUPINDEX_MODE",
    "DUPINDEX_WORKERS",
    "DB_PATH",
    "BATCH_SIZE",
];

fn env_lock() -> MutexGuard<'static, ()> {
    let guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    for var in TOUCHED_VARS {
        std::env::remove_var(var);
    }
    guard
}

fn clear_env() {
    for var in TOUCHED_VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn test_config_defaults_extract() {
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.hidden_policy, HiddenPolicy::DotFilesAndSystem);
}

#[test]
fn test_config_load_from_toml() {
    let _guard = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
db_path = "/srv/index/db.sq3"
batch_size = 250
workers = 2
mode = "single"
hash_algorithm = "blake3"
hidden_policy = "include"
batch_failure = "abort-batch"
ignore_names = ["build"]
ignore_extensions = [".bak"]
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.db_path, PathBuf::from("/srv/index/db.sq3"));
    assert_eq!(config.batch_size, 250);
    assert_eq!(config.workers, 2);
    assert_eq!(config.mode, ScanMode::Single);
    assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3);
    assert_eq!(config.hidden_policy, HiddenPolicy::Include);
    assert_eq!(config.batch_failure, BatchFailurePolicy::AbortBatch);
    assert_eq!(config.ignore_names, vec!["build".to_string()]);
    // untouched keys keep their defaults
    assert_eq!(config.queue_capacity, Config::default().queue_capacity);
}

#[test]
fn test_env_overrides_file() {
    let _guard = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "batch_size = 250\nmode = \"single\"\n").unwrap();

    std::env::set_var("DUPINDEX_BATCH_SIZE", "7");
    std::env::set_var("DUPINDEX_MODE", "concurrent");
    let config = Config::load(Some(&path));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.batch_size, 7);
    assert_eq!(config.mode, ScanMode::Concurrent);
}

#[test]
fn test_legacy_env_vars() {
    let _guard = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "").unwrap();

    std::env::set_var("DB_PATH", "/var/lib/idx.sq3");
    std::env::set_var("BATCH_SIZE", "42");
    let legacy = Config::load(Some(&path));
    std::env::set_var("DUPINDEX_BATCH_SIZE", "43");
    let prefixed = Config::load(Some(&path));
    clear_env();

    let legacy = legacy.unwrap();
    assert_eq!(legacy.db_path, PathBuf::from("/var/lib/idx.sq3"));
    assert_eq!(legacy.batch_size, 42);
    assert_eq!(prefixed.unwrap().batch_size, 43);
}

#[test]
fn test_cli_overrides_env() {
    let _guard = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "workers = 3\n").unwrap();

    std::env::set_var("DUPINDEX_WORKERS", "5");
    let loaded = Config::load(Some(&path));
    clear_env();

    let mut config = loaded.unwrap();
    assert_eq!(config.workers, 5);
    let cli = Cli::try_parse_from(["dupindex", "--workers", "9", "--batch-size", "11"]).unwrap();
    cli.apply_overrides(&mut config);
    assert_eq!(config.workers, 9);
    assert_eq!(config.batch_size, 11);
}

#[test]
fn test_invalid_toml_is_load_error() {
    let _guard = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "batch_size = \"lots\"\n").unwrap();

    assert!(matches!(Config::load(Some(&path)), Err(ConfigError::Load(_))));
}

#[test]
fn test_zero_batch_size_rejected() {
    let _guard = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "batch_size = 0\n").unwrap();

    assert!(matches!(Config::load(Some(&path)), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_unknown_mode_rejected() {
    let _guard = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "mode = \"turbo\"\n").unwrap();

    assert!(Config::load(Some(&path)).is_err());
}
