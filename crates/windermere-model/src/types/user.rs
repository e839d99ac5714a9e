//! The SS12000:2018 user (student or teacher).

use serde::{Deserialize, Serialize};

use super::common::{Enrolment, ScimEmail, ScimName};

/// Schema URN of the SS12000:2018 SCIM user extension.
pub const SCHOOL_EXTENSION_URN: &str = "urn:scim:schemas:extension:sis:school:1.0:User";

/// Schema URN of the non-standard EGIL user extension.
pub const EGIL_EXTENSION_URN: &str = "urn:scim:schemas:extension:egil:1.0:User";

/// An SS12000:2018 user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The user's UUID.
    pub external_id: String,
    /// The user's EPPN.
    pub user_name: String,
    /// The user's real name.
    pub name: ScimName,
    /// What to show for the user (required by EGIL).
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<ScimEmail>,
    /// The SS12000:2018 SCIM extension.
    #[serde(rename = "urn:scim:schemas:extension:sis:school:1.0:User", default)]
    pub extension: UserExtension,
    /// Non-standard extension carrying external identifiers.
    #[serde(
        rename = "urn:scim:schemas:extension:egil:1.0:User",
        skip_serializing_if = "Option::is_none"
    )]
    pub egil_extension: Option<EgilUserExtension>,
}

/// SS12000:2018's extension to the SCIM user object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExtension {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enrolments: Vec<Enrolment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub civic_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_marking: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_relations: Vec<UserRelation>,
}

/// A relation to another user as defined in SS12000:2018.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRelation {
    pub value: String,
    #[serde(rename = "$ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    pub relation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// An external identifier, taken from SS12000:2020 to support import from
/// newer sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentifier {
    pub value: String,
    pub context: String,
    pub globally_unique: bool,
}

/// Non-standard EGIL extension, currently only external identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgilUserExtension {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_identifiers: Vec<ExternalIdentifier>,
}
