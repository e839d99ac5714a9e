//! Resource parsing: endpoint name + raw JSON body in, typed entity out.

use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::types::{
    Activity, Employment, Entity, Organisation, SchoolUnit, SchoolUnitGroup, StudentGroup, User,
};

/// The seven endpoint names the server provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Users,
    StudentGroups,
    Organisations,
    SchoolUnitGroups,
    SchoolUnits,
    Employments,
    Activities,
}

impl ResourceType {
    /// All resource types, in default send order for dependent data.
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Organisations,
        ResourceType::SchoolUnitGroups,
        ResourceType::SchoolUnits,
        ResourceType::Users,
        ResourceType::Employments,
        ResourceType::StudentGroups,
        ResourceType::Activities,
    ];

    /// The endpoint (and main table) name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Users => "Users",
            ResourceType::StudentGroups => "StudentGroups",
            ResourceType::Organisations => "Organisations",
            ResourceType::SchoolUnitGroups => "SchoolUnitGroups",
            ResourceType::SchoolUnits => "SchoolUnits",
            ResourceType::Employments => "Employments",
            ResourceType::Activities => "Activities",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Users" => Ok(ResourceType::Users),
            "StudentGroups" => Ok(ResourceType::StudentGroups),
            "Organisations" => Ok(ResourceType::Organisations),
            "SchoolUnitGroups" => Ok(ResourceType::SchoolUnitGroups),
            "SchoolUnits" => Ok(ResourceType::SchoolUnits),
            "Employments" => Ok(ResourceType::Employments),
            "Activities" => Ok(ResourceType::Activities),
            _ => Err(()),
        }
    }
}

/// Parse a raw resource body into a typed entity.
///
/// An unknown `resource_type` yields `Ok(None)` so that callers can treat
/// the resource as an opaque pass-through. Invalid JSON, or JSON missing a
/// required attribute, yields [`ModelError::Malformed`].
pub fn parse_resource(resource_type: &str, resource: &str) -> Result<Option<Entity>, ModelError> {
    let Ok(resource_type) = resource_type.parse::<ResourceType>() else {
        return Ok(None);
    };
    parse_typed(resource_type, resource).map(Some)
}

/// Parse a raw resource body for a known resource type.
pub fn parse_typed(resource_type: ResourceType, resource: &str) -> Result<Entity, ModelError> {
    let entity = match resource_type {
        ResourceType::Users => Entity::User(serde_json::from_str::<User>(resource)?),
        ResourceType::StudentGroups => {
            Entity::StudentGroup(serde_json::from_str::<StudentGroup>(resource)?)
        }
        ResourceType::Organisations => {
            Entity::Organisation(serde_json::from_str::<Organisation>(resource)?)
        }
        ResourceType::SchoolUnitGroups => {
            Entity::SchoolUnitGroup(serde_json::from_str::<SchoolUnitGroup>(resource)?)
        }
        ResourceType::SchoolUnits => {
            Entity::SchoolUnit(serde_json::from_str::<SchoolUnit>(resource)?)
        }
        ResourceType::Employments => {
            Entity::Employment(serde_json::from_str::<Employment>(resource)?)
        }
        ResourceType::Activities => Entity::Activity(serde_json::from_str::<Activity>(resource)?),
    };
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_passed_through() {
        let parsed = parse_resource("Unicorns", "{}").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn user_requires_user_name() {
        let body = r#"{
            "externalId": "75c666db-e60e-4687-bdd3-1af191fa6799",
            "name": {"familyName": "Jensen", "givenName": "Barbara"},
            "displayName": "Babs"
        }"#;
        let err = parse_resource("Users", body).unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[test]
    fn user_requires_nested_name_parts() {
        let body = r#"{
            "externalId": "75c666db-e60e-4687-bdd3-1af191fa6799",
            "userName": "baje@x.se",
            "name": {"givenName": "Barbara"},
            "displayName": "Babs"
        }"#;
        assert!(parse_resource("Users", body).is_err());
    }

    #[test]
    fn user_round_trips() {
        let body = r#"{
            "externalId": "75c666db-e60e-4687-bdd3-1af191fa6799",
            "userName": "baje@x.se",
            "name": {"familyName": "Jensen", "givenName": "Barbara"},
            "displayName": "Babs",
            "emails": [{"value": "baje@x.se", "type": "work"}],
            "urn:scim:schemas:extension:sis:school:1.0:User": {
                "enrolments": [{"value": "12345678", "schoolYear": 3}]
            }
        }"#;
        let entity = parse_resource("Users", body).unwrap().unwrap();
        assert_eq!(entity.id(), "75c666db-e60e-4687-bdd3-1af191fa6799");
        let serialized = serde_json::to_value(&entity).unwrap();
        assert_eq!(serialized["userName"], "baje@x.se");
        assert_eq!(
            serialized["urn:scim:schemas:extension:sis:school:1.0:User"]["enrolments"][0]
                ["schoolYear"],
            3
        );
    }

    #[test]
    fn student_group_requires_owner() {
        let body = r#"{
            "externalId": "39074b36-e0ed-4443-a501-5148992014b9",
            "displayName": "1A"
        }"#;
        assert!(parse_resource("StudentGroups", body).is_err());
    }

    #[test]
    fn school_unit_requires_school_unit_code() {
        let body = r#"{
            "externalId": "a2b3c4d5-e0ed-4443-a501-5148992014b9",
            "displayName": "Skolan"
        }"#;
        assert!(parse_resource("SchoolUnits", body).is_err());
    }

    #[test]
    fn activity_accepts_singular_group() {
        let body = r#"{
            "externalId": "c9749d05-b363-4a49-a364-053b30de3f91",
            "displayName": "Math",
            "owner": {"value": "c8331abf-2b84-4dd6-a921-a8d4ff06ca4c"},
            "group": {"value": "39074b36-e0ed-4443-a501-5148992014b9"}
        }"#;
        let Entity::Activity(activity) = parse_resource("Activities", body).unwrap().unwrap()
        else {
            panic!("expected an activity");
        };
        assert_eq!(activity.groups.len(), 1);
        assert_eq!(activity.groups[0].value, "39074b36-e0ed-4443-a501-5148992014b9");
        // The canonical form is always plural.
        let serialized = serde_json::to_value(&activity).unwrap();
        assert!(serialized.get("group").is_none());
        assert_eq!(serialized["groups"][0]["value"], "39074b36-e0ed-4443-a501-5148992014b9");
    }

    #[test]
    fn activity_accepts_plural_groups() {
        let body = r#"{
            "externalId": "c9749d05-b363-4a49-a364-053b30de3f91",
            "displayName": "Math",
            "owner": {"value": "c8331abf-2b84-4dd6-a921-a8d4ff06ca4c"},
            "groups": [
                {"value": "39074b36-e0ed-4443-a501-5148992014b9"},
                {"value": "59b66cbe-e994-4d09-a2d8-a3b9c6d8b63a"}
            ],
            "teachers": [{"value": "8d2e8b2f-21ae-42ea-a35a-b551b1b3a2ca"}]
        }"#;
        let Entity::Activity(activity) = parse_resource("Activities", body).unwrap().unwrap()
        else {
            panic!("expected an activity");
        };
        assert_eq!(activity.groups.len(), 2);
        assert_eq!(activity.teachers.len(), 1);
    }

    #[test]
    fn employment_requires_user() {
        let body = r#"{
            "externalId": "5cc1eb29-d9e2-4f90-bfea-53d7a1945021",
            "employedAt": {"value": "c8331abf-2b84-4dd6-a921-a8d4ff06ca4c"},
            "employmentRole": "Lärare"
        }"#;
        assert!(parse_resource("Employments", body).is_err());
    }
}
