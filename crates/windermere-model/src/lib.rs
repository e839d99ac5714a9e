//! Typed SS12000:2018 resource model.
//!
//! This crate owns the data model the SCIM server stores: the seven
//! provisioned entity types, JSON parsing with required-attribute
//! enforcement, and the pluggable syntactic validators that run after
//! parsing.

pub mod error;
pub mod parser;
pub mod types;
pub mod validation;

pub use error::ModelError;
pub use parser::{parse_resource, ResourceType};
pub use types::{
    Activity, EgilUserExtension, Employment, Enrolment, Entity, ExternalIdentifier, Organisation,
    SchoolUnit, SchoolUnitGroup, ScimEmail, ScimName, ScimReference, StudentGroup, User,
    UserExtension, UserRelation,
};
pub use validation::{
    multi_validator, no_validation, optional_validator, school_unit_code_validator,
    uuid_validator, Validator,
};
