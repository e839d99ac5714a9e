//! Stored import configuration.
//!
//! [`ImportConfig`] is what the operator configures and what the
//! persistence layer stores, one row per tenant. It is deliberately
//! separate from [`crate::runner::RunnerConfig`], which carries live
//! handles and is assembled from this when a runner starts.

use serde::{Deserialize, Serialize};

/// How to authenticate against a specific SS12000 v2 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationType {
    /// OAuth2 client credentials against the national SkolID service.
    EduCloud,
    /// A static key sent in a configurable header.
    #[serde(rename = "APIKey")]
    ApiKey,
}

/// Connection and authentication settings for an SS12000 v2 API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfiguration {
    /// Base URL of the SS12000 API.
    pub url: String,
    pub authentication: AuthenticationType,
    /// Used for EduCloud authentication.
    #[serde(default)]
    pub client_id: String,
    /// Used for EduCloud and APIKey authentication.
    #[serde(default)]
    pub client_secret: String,
    /// Used for APIKey authentication.
    #[serde(default)]
    pub api_key_header: String,
}

/// Everything stored about one tenant's import. Durations are seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    pub tenant: String,
    pub api: ApiConfiguration,
    pub full_import_frequency: u64,
    pub full_import_retry_wait: u64,
    pub incremental_import_frequency: u64,
    pub incremental_import_retry_wait: u64,
}
