//! Value types shared between entities.

use serde::{Deserialize, Serialize};

/// A person's name as defined in SCIM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimName {
    pub family_name: String,
    pub given_name: String,
}

/// An email address as defined in SCIM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimEmail {
    /// The actual email address.
    pub value: String,
    /// The kind of address (work, home, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub r#type: String,
}

/// A reference to another SCIM resource, carried as a plain id string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScimReference {
    #[serde(default)]
    pub value: String,
    #[serde(rename = "$ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
}

impl ScimReference {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reference: String::new(),
        }
    }
}

/// An enrolment at a school unit as defined in SS12000:2018.
///
/// `value` carries the school unit's code (not its id).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrolment {
    pub value: String,
    #[serde(rename = "$ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_code: Option<String>,
}
