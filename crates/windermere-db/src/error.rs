//! Storage error taxonomy.
//!
//! The first three kinds map directly onto SCIM HTTP statuses (409, 404,
//! 400); everything else is infrastructure and surfaces as a 500.

use thiserror::Error;

/// Errors surfaced by the storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An attempt was made to create a resource that already exists.
    #[error("object {0} already exists")]
    Conflict(String),

    /// The resource doesn't exist in the backend.
    #[error("couldn't find object {0}")]
    MissingResource(String),

    /// The client sent a resource that's invalid, for instance missing
    /// required attributes.
    #[error("failed to parse resource: {0}")]
    MalformedResource(String),

    /// The endpoint name doesn't correspond to a stored resource type.
    #[error("unrecognized resource type {0}")]
    UnknownResourceType(String),

    /// The database schema is newer than this build supports.
    #[error("database schema version {found} is newer than supported version {supported}; downgrade the schema to continue with this version")]
    SchemaTooNew { found: i64, supported: i64 },

    /// The connection URL uses a driver we don't support.
    #[error("unsupported database URL: {0}")]
    UnsupportedDriver(String),

    /// A downgrade was requested to a version we can't reach.
    #[error("current database version is {current}, can't downgrade to {target}")]
    InvalidDowngrade { current: i64, target: i64 },

    /// A bulk operation was aborted because its context was cancelled.
    #[error("operation terminated prematurely: {0}")]
    Cancelled(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// True for the error kinds a SCIM client caused (as opposed to
    /// infrastructure failures).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StorageError::Conflict(_)
                | StorageError::MissingResource(_)
                | StorageError::MalformedResource(_)
        )
    }
}
