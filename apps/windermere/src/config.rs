//! Service configuration loaded from environment variables.
//!
//! Required variables must be present and valid or the process exits with
//! a clear message before anything else starts.

use std::collections::HashMap;
use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// All the knobs the service reads at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the SCIM listener binds to.
    pub listen_addr: String,
    /// Connection URL for the SCIM storage database.
    pub storage_url: String,
    /// Connection URL for the import configuration database.
    pub import_database_url: String,
    /// Header carrying the client API key.
    pub api_key_header: String,
    /// API key → tenant map; empty means unauthenticated single-tenant
    /// operation.
    pub clients: HashMap<String, String>,
    /// Reject resources whose id is not a well formed UUID.
    pub validate_uuids: bool,
    /// Reject school units without an eight digit school unit code.
    pub validate_school_unit_codes: bool,
    /// Log filter directive.
    pub log_filter: String,
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::Invalid {
                name,
                reason: format!("expected a boolean, got \"{other}\""),
            }),
        },
    }
}

impl Config {
    /// Load the configuration, failing fast on anything unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage_url = env::var("WINDERMERE_STORAGE_URL")
            .map_err(|_| ConfigError::Missing("WINDERMERE_STORAGE_URL"))?;

        let clients = match env::var("WINDERMERE_CLIENTS") {
            Err(_) => HashMap::new(),
            Ok(raw) => {
                serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
                    name: "WINDERMERE_CLIENTS",
                    reason: format!("expected a JSON object of api-key to tenant: {e}"),
                })?
            }
        };

        Ok(Self {
            listen_addr: env::var("WINDERMERE_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            storage_url,
            import_database_url: env::var("WINDERMERE_IMPORT_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://windermere-import.db?mode=rwc".to_string()),
            api_key_header: env::var("WINDERMERE_API_KEY_HEADER")
                .unwrap_or_else(|_| "X-API-Key".to_string()),
            clients,
            validate_uuids: parse_bool("WINDERMERE_VALIDATE_UUIDS", true)?,
            validate_school_unit_codes: parse_bool("WINDERMERE_VALIDATE_SCHOOL_UNIT_CODES", true)?,
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing() {
        std::env::remove_var("TEST_WINDERMERE_FLAG");
        assert!(parse_bool("TEST_WINDERMERE_FLAG", true).unwrap());

        std::env::set_var("TEST_WINDERMERE_FLAG", "off");
        assert!(!parse_bool("TEST_WINDERMERE_FLAG", true).unwrap());

        std::env::set_var("TEST_WINDERMERE_FLAG", "maybe");
        assert!(parse_bool("TEST_WINDERMERE_FLAG", true).is_err());
        std::env::remove_var("TEST_WINDERMERE_FLAG");
    }
}
