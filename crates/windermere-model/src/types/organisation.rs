//! Organisations and school unit groups.
//!
//! Both types carry only an id and a display name.

use serde::{Deserialize, Serialize};

/// An SS12000:2018 organisation (typically a principal, "huvudman").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
    pub external_id: String,
    pub display_name: String,
}

/// An SS12000:2018 school unit group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolUnitGroup {
    pub external_id: String,
    pub display_name: String,
}
