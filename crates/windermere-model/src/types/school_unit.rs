//! School units.

use serde::{Deserialize, Serialize};

use super::common::ScimReference;

/// An SS12000:2018 school unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolUnit {
    /// The school unit's UUID.
    pub external_id: String,
    /// The official school unit code ("skolenhetskod").
    pub school_unit_code: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation: Option<ScimReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_unit_group: Option<ScimReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_code: Option<String>,
}
