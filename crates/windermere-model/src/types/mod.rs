//! The SS12000:2018 entity types.
//!
//! Every type round-trips through JSON with the exact SCIM attribute names.
//! The client-supplied `externalId` is the primary identifier for all of
//! them; cross-entity references are carried as plain id strings inside
//! [`ScimReference`] values and are intentionally not resolved here.

mod activity;
mod common;
mod employment;
mod organisation;
mod school_unit;
mod student_group;
mod user;

pub use activity::Activity;
pub use common::{Enrolment, ScimEmail, ScimName, ScimReference};
pub use employment::Employment;
pub use organisation::{Organisation, SchoolUnitGroup};
pub use school_unit::SchoolUnit;
pub use student_group::StudentGroup;
pub use user::{EgilUserExtension, ExternalIdentifier, User, UserExtension, UserRelation};

use serde::Serialize;

/// One provisioned SS12000:2018 object of any of the seven types.
///
/// The set is closed; storage and dispatch code matches exhaustively.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Entity {
    User(User),
    StudentGroup(StudentGroup),
    Organisation(Organisation),
    SchoolUnitGroup(SchoolUnitGroup),
    SchoolUnit(SchoolUnit),
    Employment(Employment),
    Activity(Activity),
}

impl Entity {
    /// The object's UUID (the `externalId` attribute).
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Entity::User(u) => &u.external_id,
            Entity::StudentGroup(g) => &g.external_id,
            Entity::Organisation(o) => &o.external_id,
            Entity::SchoolUnitGroup(g) => &g.external_id,
            Entity::SchoolUnit(s) => &s.external_id,
            Entity::Employment(e) => &e.external_id,
            Entity::Activity(a) => &a.external_id,
        }
    }

    /// The endpoint name this entity belongs to.
    #[must_use]
    pub fn resource_type(&self) -> crate::parser::ResourceType {
        use crate::parser::ResourceType;
        match self {
            Entity::User(_) => ResourceType::Users,
            Entity::StudentGroup(_) => ResourceType::StudentGroups,
            Entity::Organisation(_) => ResourceType::Organisations,
            Entity::SchoolUnitGroup(_) => ResourceType::SchoolUnitGroups,
            Entity::SchoolUnit(_) => ResourceType::SchoolUnits,
            Entity::Employment(_) => ResourceType::Employments,
            Entity::Activity(_) => ResourceType::Activities,
        }
    }
}
