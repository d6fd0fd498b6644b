//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, which turns a root directory
//! into a lazy sequence of absolute paths of files eligible for
//! fingerprinting. Traversal is single-threaded and link-unaware: symbolic
//! links are never followed, so self-referential links cannot produce a
//! cycle.
//!
//! # Filtering
//!
//! Each entry is checked in a fixed order:
//!
//! 1. Excluded path or name on the ignore-list: skipped, and a directory is
//!    pruned with its subtree
//! 2. Hidden according to the [`HiddenPolicy`](super::HiddenPolicy): skipped (and pruned)
//! 3. Files only: extension on the ignore-extensions list
//! 4. Files only: zero bytes
//!
//! # Fault Tolerance
//!
//! A directory that cannot be opened is logged (a warning for permission
//! errors) and its subtree is skipped. A single entry whose metadata cannot
//! be read is logged and skipped while its siblings continue.
//!
//! # Example
//!
//! ```no_run
//! use dupindex::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Pictures"), WalkerConfig::default());
//! let counters = walker.counters();
//! let files: Vec<_> = walker.walk().collect();
//! println!("{} eligible files, {} errors", files.len(), counters.snapshot().errors);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::{ScanError, WalkerConfig};

/// Live counters of walker decisions, shared with whoever reports on the walk.
#[derive(Debug, Default)]
pub struct WalkCounters {
    yielded: AtomicU64,
    ignored: AtomicU64,
    hidden: AtomicU64,
    ignored_extension: AtomicU64,
    empty: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`WalkCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WalkStats {
    /// Eligible files yielded
    pub yielded: u64,
    /// Entries skipped by the ignore-list (a pruned directory counts once)
    pub ignored: u64,
    /// Entries skipped as hidden
    pub hidden: u64,
    /// Files skipped by extension
    pub ignored_extension: u64,
    /// Zero-byte files skipped
    pub empty: u64,
    /// Directories or entries that could not be read
    pub errors: u64,
}

impl WalkCounters {
    /// Copy the current values.
    #[must_use]
    pub fn snapshot(&self) -> WalkStats {
        WalkStats {
            yielded: self.yielded.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            hidden: self.hidden.load(Ordering::Relaxed),
            ignored_extension: self.ignored_extension.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Directory walker for eligible file discovery.
///
/// A walker performs exactly one traversal: [`Walker::walk`] consumes it.
#[derive(Debug)]
pub struct Walker {
    /// Absolute root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Shared decision counters
    counters: Arc<WalkCounters>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// A relative root is made absolute against the current directory
    /// without resolving symbolic links.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dupindex::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), WalkerConfig::default());
    /// ```
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        let root = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let config = WalkerConfig {
            ignore_extensions: config
                .ignore_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            excluded_paths: normalize_exclusions(&config.excluded_paths),
            ..config
        };
        Self {
            root,
            config,
            counters: Arc::new(WalkCounters::default()),
        }
    }

    /// The absolute root this walker will traverse.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle to the decision counters, readable during and after the walk.
    #[must_use]
    pub fn counters(&self) -> Arc<WalkCounters> {
        Arc::clone(&self.counters)
    }

    /// Walk the directory tree, yielding eligible file paths lazily.
    ///
    /// Errors never end the iteration; they are logged and counted.
    pub fn walk(self) -> impl Iterator<Item = PathBuf> {
        let Walker {
            root,
            config,
            counters,
        } = self;
        let prune_config = config.clone();
        let prune_counters = Arc::clone(&counters);

        WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0 || passes_name_filters(entry, &prune_config, &prune_counters)
            })
            .filter_map(move |result| match result {
                Ok(entry) => accept_file(entry, &config, &counters),
                Err(e) => {
                    WalkCounters::bump(&counters.errors);
                    log_walk_error(classify_error(e));
                    None
                }
            })
    }
}

/// Ignore-list and hidden policy. Applied to files and directories alike,
/// so a rejected directory is never descended.
fn passes_name_filters(entry: &DirEntry, config: &WalkerConfig, counters: &WalkCounters) -> bool {
    let name = entry.file_name().to_string_lossy();

    if config.excluded_paths.iter().any(|p| p == entry.path()) {
        log::debug!("Excluded: {}", entry.path().display());
        WalkCounters::bump(&counters.ignored);
        return false;
    }

    if config.ignore_names.iter().any(|n| *n == name) {
        log::debug!("Ignored: {}", entry.path().display());
        WalkCounters::bump(&counters.ignored);
        return false;
    }

    let metadata = if config.hidden_policy.needs_metadata(&name) {
        entry.metadata().ok()
    } else {
        None
    };
    if config.hidden_policy.is_hidden(&name, metadata.as_ref()) {
        log::debug!("Ignored hidden: {}", entry.path().display());
        WalkCounters::bump(&counters.hidden);
        return false;
    }

    true
}

/// Absolute and canonical forms of each excluded path, so a match does
/// not depend on how the root or the exclusion was spelled.
fn normalize_exclusions(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut normalized = Vec::with_capacity(paths.len() * 2);
    for path in paths {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
        if let Ok(canonical) = absolute.canonicalize() {
            if canonical != absolute {
                normalized.push(canonical);
            }
        }
        normalized.push(absolute);
    }
    normalized
}

/// Extension and size checks for regular files.
fn accept_file(entry: DirEntry, config: &WalkerConfig, counters: &WalkCounters) -> Option<PathBuf> {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        return None;
    }
    if !file_type.is_file() {
        log::trace!("Skipping non-regular entry: {}", entry.path().display());
        return None;
    }

    let name = entry.file_name().to_string_lossy().to_lowercase();
    if config
        .ignore_extensions
        .iter()
        .any(|ext| name.len() > ext.len() && name.ends_with(ext.as_str()))
    {
        log::debug!("Ignored extension: {}", entry.path().display());
        WalkCounters::bump(&counters.ignored_extension);
        return None;
    }

    let metadata = match entry.metadata() {
        Ok(m) => m,
        Err(e) => {
            WalkCounters::bump(&counters.errors);
            log_walk_error(classify_error(e));
            return None;
        }
    };

    if metadata.len() == 0 {
        log::debug!("Ignored empty file: {}", entry.path().display());
        WalkCounters::bump(&counters.empty);
        return None;
    }

    WalkCounters::bump(&counters.yielded);
    Some(entry.into_path())
}

/// Convert a walkdir error into a [`ScanError`].
fn classify_error(error: walkdir::Error) -> ScanError {
    use std::io::ErrorKind;

    let path = error.path().map(Path::to_path_buf).unwrap_or_default();
    let kind = error.io_error().map(std::io::Error::kind);
    match kind {
        Some(ErrorKind::PermissionDenied) => ScanError::PermissionDenied(path),
        Some(ErrorKind::NotFound) => ScanError::NotFound(path),
        _ => ScanError::Io {
            path,
            source: error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
        },
    }
}

fn log_walk_error(error: ScanError) {
    match error {
        ScanError::PermissionDenied(path) => {
            log::warn!("Skipped protected folder: {}", path.display());
        }
        ScanError::NotFound(path) => {
            log::debug!("Entry vanished during walk: {}", path.display());
        }
        other => log::error!("Error accessing {other}"),
    }
}
