//! Student groups (classes, teaching groups and so on).

use serde::{Deserialize, Serialize};

use super::common::ScimReference;

/// An SS12000:2018 student group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGroup {
    /// The group's UUID.
    pub external_id: String,
    /// Human readable name.
    pub display_name: String,
    /// The school unit the group belongs to.
    pub owner: ScimReference,
    /// The kind of group (klass, undervisning, ...).
    #[serde(rename = "studentGroupType", skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    /// The students in the group.
    #[serde(default)]
    pub student_memberships: Vec<ScimReference>,
    /// The type of education ("skolform", GR, GY etc.).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_type: Option<String>,
}
