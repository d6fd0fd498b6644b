//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Lazy, link-unaware directory walking using walkdir
//! - Streaming content fingerprints (SHA-256 or BLAKE3)
//! - An explicit hidden-file policy
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and eligibility filtering
//! - [`hasher`]: Streaming 256-bit content fingerprints
//! - [`hidden`]: Hidden-file detection policy
//!
//! # Example
//!
//! ```no_run
//! use dupindex::scanner::{Hasher, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! let hasher = Hasher::new();
//! for path in walker.walk() {
//!     match hasher.hash_file(&path) {
//!         Ok(fp) => println!("{}  {}", fp.to_hex(), path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod hidden;
pub mod walker;

use std::path::PathBuf;

pub use hasher::{Fingerprint, HashAlgorithm, Hasher};
pub use hidden::HiddenPolicy;
pub use walker::Walker;

/// Directory and file names skipped by default, including their subtrees.
pub const DEFAULT_IGNORE_NAMES: &[&str] = &[
    "node_modules",
    "__pycache__",
    ".git",
    ".svn",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    "$Recycle.Bin",
    "System Volume Information",
    "Program Files",
    "Program Files (x86)",
    "Windows",
    "AppData",
    "Local Settings",
    "Recovery",
    "PerfLogs",
    "Temp",
    "Tmp",
    "cache",
    "Cache",
    "__MACOSX",
    ".Spotlight-V100",
    ".Trashes",
    "ehthumbs.db",
    "pagefile.sys",
    "hiberfil.sys",
    "swapfile.sys",
];

/// File extensions skipped by default (compared case-insensitively).
pub const DEFAULT_IGNORE_EXTENSIONS: &[&str] = &[".aof", ".incr.aof", ".tmp", ".dmp", ".log"];

/// Configuration for directory walking.
///
/// Filters are applied per entry in this order: ignore-list name,
/// hidden policy, ignored extension (files only), zero size.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Exact entry names to skip. A matching directory is pruned with its subtree.
    pub ignore_names: Vec<String>,

    /// Extensions to skip, with leading dot (`.tmp`). Multi-part
    /// extensions such as `.incr.aof` match on the name suffix.
    pub ignore_extensions: Vec<String>,

    /// Which entries count as hidden and are skipped.
    pub hidden_policy: HiddenPolicy,

    /// Exact paths to skip, such as the store and listing files when they
    /// live under the scan root. A matching directory is pruned.
    pub excluded_paths: Vec<PathBuf>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            ignore_names: DEFAULT_IGNORE_NAMES.iter().map(|s| (*s).to_string()).collect(),
            ignore_extensions: DEFAULT_IGNORE_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            hidden_policy: HiddenPolicy::default(),
            excluded_paths: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// A configuration with no ignore lists and hidden files included.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            ignore_names: Vec::new(),
            ignore_extensions: Vec::new(),
            hidden_policy: HiddenPolicy::Include,
            excluded_paths: Vec::new(),
        }
    }

    /// Replace the ignore-list of entry names.
    #[must_use]
    pub fn with_ignore_names(mut self, names: Vec<String>) -> Self {
        self.ignore_names = names;
        self
    }

    /// Replace the ignore-list of extensions.
    #[must_use]
    pub fn with_ignore_extensions(mut self, extensions: Vec<String>) -> Self {
        self.ignore_extensions = extensions;
        self
    }

    /// Set the hidden-file policy.
    #[must_use]
    pub fn with_hidden_policy(mut self, policy: HiddenPolicy) -> Self {
        self.hidden_policy = policy;
        self
    }

    /// Add paths that must never be yielded or descended.
    #[must_use]
    pub fn with_excluded_paths<I: IntoIterator<Item = PathBuf>>(mut self, paths: I) -> Self {
        self.excluded_paths.extend(paths);
        self
    }
}

/// Errors that can occur during directory scanning.
///
/// The walker never stops on these; they are logged and the affected
/// entry or subtree is skipped.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when opening a directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file fingerprinting.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file disappeared before or while it was read.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
