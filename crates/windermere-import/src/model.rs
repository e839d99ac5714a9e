//! Wire model for the SS12000 v2 API.
//!
//! Only the attributes the import consumes are modeled; everything else in
//! the remote's payloads is ignored. Fields the remote may omit are
//! defaulted rather than rejected; a single sloppy object must not abort a
//! whole tenant's import at the parse stage.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Creation/modification stamps carried by every v2 object.
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A reference to another v2 object by id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectReference {
    #[serde(default)]
    pub id: Uuid,
}

/// A v2 organisation; covers both principals ("Huvudman") and school
/// units ("Skolenhet"), distinguished by `organisationType`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
    pub id: Uuid,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub organisation_type: Option<String>,
    #[serde(default)]
    pub school_unit_code: Option<String>,
    #[serde(default)]
    pub school_types: Option<Vec<String>>,
    #[serde(default)]
    pub municipality_code: Option<String>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrolment {
    #[serde(default)]
    pub enroled_at: ObjectReference,
    #[serde(default)]
    pub school_year: Option<i32>,
    #[serde(default)]
    pub school_type: Option<String>,
    #[serde(default)]
    pub education_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentifier {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub globally_unique: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: Uuid,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub edu_person_principal_names: Option<Vec<String>>,
    #[serde(default)]
    pub emails: Option<Vec<Email>>,
    #[serde(default)]
    pub enrolments: Option<Vec<Enrolment>>,
    #[serde(default)]
    pub external_identifiers: Option<Vec<ExternalIdentifier>>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembership {
    #[serde(default)]
    pub person: ObjectReference,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub group_type: Option<String>,
    #[serde(default)]
    pub school_type: Option<String>,
    #[serde(default)]
    pub organisation: ObjectReference,
    #[serde(default)]
    pub group_memberships: Option<Vec<GroupMembership>>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Duty {
    pub id: Uuid,
    #[serde(default)]
    pub duty_at: ObjectReference,
    #[serde(default)]
    pub person: Option<ObjectReference>,
    #[serde(default)]
    pub duty_role: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTeacher {
    #[serde(default)]
    pub duty: ObjectReference,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub organisation: ObjectReference,
    #[serde(default)]
    pub groups: Vec<ObjectReference>,
    #[serde(default)]
    pub teachers: Option<Vec<ActivityTeacher>>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// One page of the `deletedEntities` feed, ids grouped per endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedEntitiesData {
    #[serde(default)]
    pub organisations: Option<Vec<Uuid>>,
    #[serde(default)]
    pub persons: Option<Vec<Uuid>>,
    #[serde(default)]
    pub groups: Option<Vec<Uuid>>,
    #[serde(default)]
    pub duties: Option<Vec<Uuid>>,
    #[serde(default)]
    pub activities: Option<Vec<Uuid>>,
}

/// The timestamps used for watermark advancement: each object's
/// `meta.created`/`meta.modified` when present, the wall clock otherwise.
pub(crate) fn meta_timestamps<'a>(
    metas: impl Iterator<Item = Option<&'a Meta>>,
) -> (Vec<DateTime<Utc>>, Vec<DateTime<Utc>>) {
    let mut created = Vec::new();
    let mut modified = Vec::new();
    for meta in metas {
        match meta {
            Some(meta) => {
                created.push(meta.created);
                modified.push(meta.modified);
            }
            None => {
                let now = Utc::now();
                created.push(now);
                modified.push(now);
            }
        }
    }
    (created, modified)
}
