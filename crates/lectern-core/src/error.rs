//! Error types module
//!
//! Every failure of an upload attempt is expressed as an `UploadError`. The
//! controller converts it into the `error` stage of the state snapshot, so the
//! `Display` output of each variant is the human-readable message callers show.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like validation failures or cancellation
    Debug,
    /// Warning level - for remote failures outside our control
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an upload error should be presented and logged
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSPORT_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether a fresh attempt with the same file may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Caller-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    /// File rejected by the size or extension gate. Never retried.
    #[error("{0}")]
    Validation(String),

    /// The selected file could not be read from its source
    #[error("Could not read the selected file: {0}")]
    FileRead(String),

    /// The network call failed outright or returned a non-success status
    #[error("{0}")]
    Transport(String),

    /// The remote answered but its body signals failure or lacks required fields
    #[error("{0}")]
    Service(String),

    /// The user aborted the attempt
    #[error("Upload cancelled")]
    Cancelled,

    /// `start` was called while another attempt was still in flight
    #[error("An upload is already in progress")]
    Busy,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// True for user-initiated aborts, so callers can show a neutral message
    pub fn is_cancellation(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }
}

impl From<io::Error> for UploadError {
    fn from(err: io::Error) -> Self {
        UploadError::FileRead(err.to_string())
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::Service(format!("Upload service returned an unreadable response: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn upload_error_static_metadata(
    err: &UploadError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        UploadError::Validation(_) => (
            "VALIDATION_ERROR",
            false,
            Some("Choose a smaller file or a supported format"),
            LogLevel::Debug,
        ),
        UploadError::FileRead(_) => (
            "FILE_READ_ERROR",
            false,
            Some("Check that the file still exists and is readable"),
            LogLevel::Warn,
        ),
        UploadError::Transport(_) => (
            "TRANSPORT_ERROR",
            true,
            Some("Check your connection and try again"),
            LogLevel::Warn,
        ),
        UploadError::Service(_) => (
            "SERVICE_ERROR",
            true,
            Some("Try again later"),
            LogLevel::Warn,
        ),
        UploadError::Cancelled => ("UPLOAD_CANCELLED", true, None, LogLevel::Debug),
        UploadError::Busy => (
            "UPLOAD_BUSY",
            true,
            Some("Wait for the current upload to finish or cancel it"),
            LogLevel::Debug,
        ),
        UploadError::Internal(_) => (
            "INTERNAL_ERROR",
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        upload_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::Internal(_) => "Something went wrong while uploading".to_string(),
            other => other.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self).3
    }
}
