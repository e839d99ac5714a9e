//! Import error type.
//!
//! Imports collapse failures into one opaque error that aborts the tick;
//! the retry-wait logic in the runner gates the next attempt. Malformed v2
//! objects are not errors at all; they are silently skipped during
//! transformation.

use thiserror::Error;
use windermere_db::StorageError;

#[derive(Debug, Error)]
pub enum ImportError {
    /// The remote SS12000 API misbehaved (connection, status, body).
    #[error("{0}")]
    Remote(String),

    /// The surrounding tick was cancelled.
    #[error("import cancelled")]
    Cancelled,

    /// Writing to the SCIM storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Reading or writing the import history failed.
    #[error("history error: {0}")]
    History(String),

    /// The import configuration couldn't be used.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::Remote(err.to_string())
    }
}
