//! Employments (a person's duty at a school unit).

use serde::{Deserialize, Serialize};

use super::common::ScimReference;

/// An SS12000:2018 employment object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employment {
    /// The employment's UUID.
    pub external_id: String,
    /// Where the person is employed.
    pub employed_at: ScimReference,
    /// The employed user.
    pub user: ScimReference,
    /// The kind of employment.
    pub employment_role: String,
    /// Teacher signature.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
}
