//! Error types for gdab.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are grouped into kinds that mirror the stages of a backup run:
//! - **Validation**: Missing or invalid credential/settings fields
//! - **Authentication**: No token, expired token that cannot be refreshed,
//!   or missing client credentials
//! - **Archive**: The OS archiver failed or is not installed
//! - **Upload**: Drive API failures, network errors, timeouts
//! - **Configuration**: Config file or scheduler problems
//! - **Internal**: I/O, JSON, or unclassified errors
//!
//! Each error has a stable error code (e.g., `GDAB-A002`) for programmatic
//! handling, and can provide fix suggestions via
//! [`GdabError::fix_suggestions()`].

pub mod suggestions;

use std::time::Duration;

use thiserror::Error;

use crate::util::format_duration;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Kinds
// =============================================================================

/// High-level error kinds for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected input; nothing was mutated.
    Validation,
    /// Not connected to Drive, or client credentials missing.
    Authentication,
    /// Archiver exited non-zero or could not be started.
    Archive,
    /// Remote API failure during upload, listing, or deletion.
    Upload,
    /// Config file, environment, or scheduler problems.
    Configuration,
    /// Unexpected errors.
    Internal,
}

impl ErrorKind {
    /// Returns a human-readable description of the kind.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Validation error",
            Self::Authentication => "Authentication error",
            Self::Archive => "Archive error",
            Self::Upload => "Upload error",
            Self::Configuration => "Configuration error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this kind.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Validation => "V",
            Self::Authentication => "A",
            Self::Archive => "R",
            Self::Upload => "U",
            Self::Configuration => "C",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Any failed operation, including every failed backup run
    GeneralError = 1,
    /// Rejected input or configuration
    InvalidInput = 2,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for gdab operations.
#[derive(Error, Debug)]
pub enum GdabError {
    // ==========================================================================
    // Validation errors
    // ==========================================================================
    /// A credential or settings field failed validation.
    #[error("{0}")]
    Validation(String),

    // ==========================================================================
    // Authentication errors
    // ==========================================================================
    /// OAuth client id/secret are not stored.
    #[error("Google API credentials not configured")]
    CredentialsNotConfigured,

    /// No usable access token (never connected, or refresh rejected).
    #[error("Not connected to Google Drive")]
    NotConnected,

    /// The authorization-code exchange was rejected.
    #[error("OAuth exchange failed: {0}")]
    OAuth(String),

    // ==========================================================================
    // Archive errors
    // ==========================================================================
    /// The archiver exited with a non-zero status.
    #[error("Failed to create backup archive for {path}")]
    Archive {
        path: String,
        exit_code: i32,
        stderr: String,
    },

    /// The archiver binary is not installed.
    #[error("archiver not found: {0}")]
    ArchiverNotFound(String),

    /// The archiver ran past the configured archive timeout and was killed.
    #[error("Archiving {path} timed out after {}", format_duration(*.after))]
    ArchiveTimeout { path: String, after: Duration },

    // ==========================================================================
    // Upload errors
    // ==========================================================================
    /// Drive returned an error response.
    #[error("Drive API error during {operation}: {message}")]
    DriveApi {
        operation: String,
        status_code: Option<u16>,
        message: String,
    },

    /// Generic network error.
    #[error("network error: {0}")]
    Network(String),

    /// An HTTP request ran past the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The host scheduler rejected an operation.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    // ==========================================================================
    // Internal errors
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GdabError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Configuration => ExitCode::InvalidInput,
            ErrorKind::Authentication
            | ErrorKind::Archive
            | ErrorKind::Upload
            | ErrorKind::Internal => ExitCode::GeneralError,
        }
    }

    /// Returns the error kind for classification and routing.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,

            Self::CredentialsNotConfigured | Self::NotConnected | Self::OAuth(_) => {
                ErrorKind::Authentication
            }

            Self::Archive { .. } | Self::ArchiverNotFound(_) | Self::ArchiveTimeout { .. } => {
                ErrorKind::Archive
            }

            Self::DriveApi { .. } | Self::Network(_) | Self::Timeout(_) => ErrorKind::Upload,

            Self::Config(_) | Self::Scheduler(_) => ErrorKind::Configuration,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `GDAB-{kind}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "GDAB-V001",

            Self::CredentialsNotConfigured => "GDAB-A001",
            Self::NotConnected => "GDAB-A002",
            Self::OAuth(_) => "GDAB-A003",

            Self::Archive { .. } => "GDAB-R001",
            Self::ArchiverNotFound(_) => "GDAB-R002",
            Self::ArchiveTimeout { .. } => "GDAB-R003",

            Self::DriveApi { .. } => "GDAB-U001",
            Self::Network(_) => "GDAB-U002",
            Self::Timeout(_) => "GDAB-U003",

            Self::Config(_) => "GDAB-C001",
            Self::Scheduler(_) => "GDAB-C002",

            Self::Io(_) => "GDAB-X001",
            Self::Json(_) => "GDAB-X002",
            Self::Other(_) => "GDAB-X099",
        }
    }

    /// HTTP status code the action API answers with for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            _ => 500,
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::Validation(message) => suggestions::validation_suggestions(message),
            Self::CredentialsNotConfigured => suggestions::credentials_missing_suggestions(),
            Self::NotConnected | Self::OAuth(_) => suggestions::not_connected_suggestions(),
            Self::Archive { path, stderr, .. } => suggestions::archive_failed_suggestions(path, stderr),
            Self::ArchiverNotFound(name) => suggestions::archiver_missing_suggestions(name),
            Self::ArchiveTimeout { path, .. } => suggestions::archive_timeout_suggestions(path),
            Self::DriveApi { status_code, .. } => suggestions::drive_api_suggestions(*status_code),
            Self::Network(_) | Self::Timeout(_) => suggestions::network_suggestions(),
            Self::Config(message) => vec![FixSuggestion::new(
                vec!["gdab status".to_string()],
                format!("Configuration error: {message}"),
            )],
            Self::Scheduler(_) => suggestions::scheduler_suggestions(),
            Self::Io(_) | Self::Json(_) | Self::Other(_) => Vec::new(),
        }
    }
}

impl From<reqwest::Error> for GdabError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type alias for gdab operations.
pub type Result<T> = std::result::Result<T, GdabError>;
