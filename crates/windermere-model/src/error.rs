//! Error type for parsing and validation.

use thiserror::Error;

/// Errors produced while turning a raw SCIM body into a typed entity.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The JSON was invalid or a required attribute was missing or had the
    /// wrong type.
    #[error("malformed resource: {0}")]
    Malformed(String),

    /// The resource parsed but failed a syntactic validator.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Malformed(err.to_string())
    }
}
