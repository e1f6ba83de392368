//! Error types for filehost.

use thiserror::Error;

/// Common error type for filehost.
#[derive(Error, Debug)]
pub enum FilehostError {
    /// Database error.
    ///
    /// Wraps any sqlx error that is not a constraint violation.
    #[error("database error: {0}")]
    Database(String),

    /// Uniqueness constraint violation (e.g. a stored name collision).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// I/O error from the file store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed upload body.
    #[error("upload error: {0}")]
    Upload(String),

    /// Request body exceeded the configured maximum.
    #[error("payload too large (limit {limit} bytes)")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: u64,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for FilehostError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return FilehostError::Constraint(db_err.message().to_string());
            }
        }
        FilehostError::Database(e.to_string())
    }
}

/// Result type alias for filehost operations.
pub type Result<T> = std::result::Result<T, FilehostError>;
