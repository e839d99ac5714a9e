//! Activities (teaching of one or more groups by one or more teachers).

use serde::{Deserialize, Deserializer, Serialize};

use super::common::ScimReference;

/// An SS12000:2018 activity.
///
/// The EGIL client traditionally sends a singular `group` attribute even
/// though the standard says `groups`; deserialization accepts both and the
/// parsed (and serialized) shape is always plural.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// The activity's UUID.
    pub external_id: String,
    pub display_name: String,
    /// The school unit.
    pub owner: ScimReference,
    pub groups: Vec<ScimReference>,
    pub teachers: Vec<ScimReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parent_activity: Vec<ScimReference>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityJson {
    external_id: String,
    display_name: String,
    owner: ScimReference,
    // Singular form, incorrect according to spec but used traditionally by
    // the EGIL client.
    group: Option<ScimReference>,
    #[serde(default)]
    groups: Vec<ScimReference>,
    #[serde(default)]
    teachers: Vec<ScimReference>,
    #[serde(default)]
    parent_activity: Vec<ScimReference>,
}

impl<'de> Deserialize<'de> for Activity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = ActivityJson::deserialize(deserializer)?;
        let groups = match raw.group {
            Some(group) => vec![group],
            None => raw.groups,
        };
        Ok(Activity {
            external_id: raw.external_id,
            display_name: raw.display_name,
            owner: raw.owner,
            groups,
            teachers: raw.teachers,
            parent_activity: raw.parent_activity,
        })
    }
}
