//! Domain-level error types for code-sync.
//!
//! All errors are typed with `thiserror` and carry enough context
//! (operation, path, underlying cause) to diagnose a failed sync after the fact.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A path the operation depends on does not exist.
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Invalid or unexpected data in a file.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The editor executable could not be run or did not answer.
    #[error("Package manager error: {message}")]
    PackageManager { message: String },

    /// File watching could not be set up.
    #[error("Watch error: {message}")]
    Watch {
        message: String,
        #[source]
        source: Option<notify::Error>,
    },
}

impl AppError {
    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a JSON parse error that names the offending file.
    pub fn json_in(path: &std::path::Path, err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: format!("{}: {err}", path.display()),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a watch error from a notify error.
    pub fn watch(message: impl Into<String>, err: notify::Error) -> Self {
        Self::Watch {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
