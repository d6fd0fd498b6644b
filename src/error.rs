//! Exit codes and structured error output.

use serde::Serialize;

use crate::config::ConfigError;
use crate::pipeline::IndexError;

/// Process exit codes.
///
/// - 0: Success (run completed; per-file failures are reported, not fatal)
/// - 1: General error (store could not be opened, worker pool failed)
/// - 2: Usage error (bad configuration, missing or invalid scan root)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The run completed.
    Success = 0,
    /// An unexpected or fatal runtime failure.
    GeneralError = 1,
    /// Invalid arguments or configuration.
    UsageError = 2,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DI000",
            Self::GeneralError => "DI001",
            Self::UsageError => "DI002",
        }
    }

    /// Classify a top-level failure.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<ConfigError>().is_some() {
            return Self::UsageError;
        }
        match err.downcast_ref::<IndexError>() {
            Some(
                IndexError::RootNotFound(_)
                | IndexError::NotADirectory(_)
                | IndexError::RootAccess { .. },
            ) => Self::UsageError,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DI001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}

/// Render a fatal error for stderr: one prefixed line, or pretty JSON.
#[must_use]
pub fn render_fatal(err: &anyhow::Error, exit_code: ExitCode, json: bool) -> String {
    let plain = || format!("[{}] Error: {:#}", exit_code.code_prefix(), err);
    if !json {
        return plain();
    }
    serde_json::to_string_pretty(&StructuredError::new(err, exit_code)).unwrap_or_else(|_| plain())
}
