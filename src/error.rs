//! Error types for `briefwatch`
//!
//! A single `thiserror` hierarchy covering configuration, event-stream,
//! and runner-command failures, plus the exit-code table used by the CLI.
//!
//! Progress-tracking failures are deliberately absent: a run that times out
//! or is cancelled terminates through the [`ProgressRecord`]'s `error`
//! field, never through this hierarchy.
//!
//! [`ProgressRecord`]: crate::progress::ProgressRecord

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `briefwatch` CLI operations.
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

    /// Runner error (spawn failure, command channel closed)
    pub const RUNNER_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `briefwatch` operations.
///
/// Aggregates all domain-specific errors and provides a unified interface
/// for error handling and exit-code mapping.
#[derive(Debug, Error)]
pub enum BriefwatchError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Runner command-channel error
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Event-stream error
    #[error(transparent)]
    Event(#[from] EventError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BriefwatchError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Runner(_) => ExitCode::RUNNER_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Event(_) | Self::Json(_) => ExitCode::ERROR,
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
        /// Error message from the parser
        message: String,
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

    /// Duration string could not be parsed
    #[error("invalid duration: '{value}' (expected suffix: ms, s, m, h)")]
    InvalidDuration {
        /// The unparseable duration string
        value: String,
    },
}

// ============================================================================
// Event-Stream Errors
// ============================================================================

/// Errors raised while normalizing the inbound event stream.
///
/// These are never surfaced to consumers of the progress record — a
/// malformed line is logged and dropped by the channel adapter.
#[derive(Debug, Error)]
pub enum EventError {
    /// Line is not valid JSON or does not match any known event shape
    #[error("malformed event line: {message}")]
    Malformed {
        /// Error message from the deserializer
        message: String,
    },
}

// ============================================================================
// Runner Command Errors
// ============================================================================

/// Errors from the outbound command channel to the external job runner.
///
/// Cancellation failures are swallowed and logged by the controller;
/// these errors only propagate to `status`/`reset` callers that asked.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// I/O error talking to the runner process
    #[error("runner I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command channel to the runner is closed
    #[error("runner channel closed: {0}")]
    ChannelClosed(String),

    /// Runner did not answer a status query in time
    #[error("runner status query timed out after {0}")]
    StatusTimeout(String),

    /// No runner is attached to this session
    #[error("no runner attached: {0}")]
    Detached(String),

    /// Runner sent a reply that could not be interpreted
    #[error("runner protocol error: {0}")]
    Protocol(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `briefwatch` operations.
pub type Result<T> = std::result::Result<T, BriefwatchError>;

// ============================================================================
// Tests
// ============================================================================
