// SPDX-License-Identifier: MIT

//! Error types for Vetter

use thiserror::Error;

/// Result type alias for Vetter operations
pub type Result<T> = std::result::Result<T, VetterError>;

/// Sub-kind of a classification failure, used for logging and the
/// run-level failure summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationErrorKind {
    /// The service rejected the request for rate-limit reasons (HTTP 429).
    RateLimited,
    /// Credential was rejected (HTTP 401/403).
    AuthFailed,
    /// The response could not be parsed into one verdict per input item.
    Malformed,
    /// The call timed out or failed at the transport level.
    Timeout,
}

impl std::fmt::Display for ClassificationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RateLimited => "rate limited",
            Self::AuthFailed => "auth failed",
            Self::Malformed => "malformed response",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Vetter error types
#[derive(Error, Debug)]
pub enum VetterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Classification failed ({kind}): {message}")]
    Classification {
        kind: ClassificationErrorKind,
        message: String,
    },

    #[error("Twitter API error: {0}")]
    Twitter(String),
}

impl VetterError {
    /// Build a classification error with the given sub-kind.
    pub fn classification(kind: ClassificationErrorKind, message: impl Into<String>) -> Self {
        Self::Classification {
            kind,
            message: message.into(),
        }
    }
}
