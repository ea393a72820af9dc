//! Error types for `stagehand`
//!
//! The sequencer itself has no fatal paths: fetch failures are absorbed by
//! the fallback list and storage failures degrade to "first visit". The
//! errors in this module belong to the outer surface (configuration
//! loading, persistence, the command-line player) and map onto process
//! exit codes.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `stagehand` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Usage error (invalid arguments, missing required options), raised
    /// by argument parsing before any command runs
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `stagehand` operations.
#[derive(Debug, Error)]
pub enum StagehandError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StagehandError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(.errors))]
    ValidationError {
        /// Path to the configuration file (or `<builtin>`)
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// A sequence referenced a theme that is not built in
    #[error("unknown theme '{name}'{}", .suggestion.as_ref().map_or_else(String::new, |s| format!(" (did you mean '{s}'?)")))]
    UnknownTheme {
        /// The requested theme name
        name: String,
        /// Closest built-in theme name, if any is close enough
        suggestion: Option<String>,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message supplied with the `${VAR:?message}` form
        location: String,
    },
}

fn summarize(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "narrative.phases[0].steps[1]")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Validation failure that prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Store Errors
// ============================================================================

/// Errors raised by persistent [`StateStore`](crate::ledger::StateStore)
/// implementations.
///
/// The visit ledger never propagates these; they surface only when a
/// store is used directly.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the backing file
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// Path of the backing file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings
    #[error("store at {path} is corrupt: {message}")]
    Corrupt {
        /// Path of the backing file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The store's lock was poisoned by a panicking writer
    #[error("store lock poisoned")]
    Poisoned,
}

// ============================================================================
// Fact Errors
// ============================================================================

/// Reasons a single remote fact attempt failed.
///
/// Never returned to callers of
/// [`FactSource::fetch_facts`](crate::facts::FactSource::fetch_facts);
/// any of these switches the whole batch to the fallback list.
#[derive(Debug, Error)]
pub enum FactError {
    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The request did not finish within the per-call timeout
    #[error("request timed out")]
    Timeout,

    /// Non-2xx response status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Body was not the expected JSON shape
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Payload had no usable `text` field
    #[error("payload has no text")]
    MissingText,

    /// Text exceeded the sanity length
    #[error("fact is {len} characters (limit: {limit})")]
    TooLong {
        /// Length of the received text in characters
        len: usize,
        /// Configured limit
        limit: usize,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `stagehand` operations.
pub type Result<T> = std::result::Result<T, StagehandError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: StagehandError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_json_error_exit_code() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StagehandError = json_err.into();
        assert_eq!(err.exit_code(), ExitCode::ERROR);
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: StagehandError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "narrative.phases[0]".to_string(),
            message: "phase has no steps".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: phase has no steps at narrative.phases[0]"
        );
    }

    #[test]
    fn test_validation_error_lists_issues() {
        let err = ConfigError::ValidationError {
            path: "site.yaml".to_string(),
            errors: vec![
                ValidationIssue {
                    path: "boot".to_string(),
                    message: "no terminal step".to_string(),
                    severity: Severity::Error,
                },
                ValidationIssue {
                    path: "narrative".to_string(),
                    message: "no phases".to_string(),
                    severity: Severity::Error,
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("no terminal step at boot"));
        assert!(rendered.contains("no phases at narrative"));
    }

    #[test]
    fn test_unknown_theme_display_with_suggestion() {
        let err = ConfigError::UnknownTheme {
            name: "cinematik".to_string(),
            suggestion: Some("cinematic".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unknown theme 'cinematik' (did you mean 'cinematic'?)"
        );
    }

    #[test]
    fn test_unknown_theme_display_without_suggestion() {
        let err = ConfigError::UnknownTheme {
            name: "zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unknown theme 'zzz'");
    }

    #[test]
    fn test_fact_error_display() {
        let err = FactError::TooLong { len: 900, limit: 400 };
        assert_eq!(err.to_string(), "fact is 900 characters (limit: 400)");
    }
}
