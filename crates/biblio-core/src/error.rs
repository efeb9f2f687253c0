//! Error types for the Biblio backoffice.

use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationErrors;

/// Result type alias using Biblio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Biblio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Dataset or publication not found
    #[error("Record not found: {0}")]
    RecordNotFound(Uuid),

    /// The stored snapshot moved on since the caller loaded the record.
    #[error("Conflict: record {id} was updated (expected snapshot {expected}, found {actual})")]
    Conflict {
        id: Uuid,
        expected: Uuid,
        actual: Uuid,
    },

    /// Record failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Search index operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Background task error
    #[error("Task error: {0}")]
    Task(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error is a stale-snapshot conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
