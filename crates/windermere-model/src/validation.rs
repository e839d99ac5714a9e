//! Pluggable syntactic validation of parsed entities.
//!
//! Validators run after parsing and before storage. They are composed with
//! [`multi_validator`]; the composed validator applies them in insertion
//! order and the first failure wins.

use regex::Regex;

use crate::error::ModelError;
use crate::types::Entity;

/// A function that does some kind of validation of an SS12000 object.
pub type Validator = Box<dyn Fn(&Entity) -> Result<(), ModelError> + Send + Sync>;

/// A validator that accepts everything.
#[must_use]
pub fn no_validation() -> Validator {
    Box::new(|_| Ok(()))
}

/// Compose several validators into one, applied in order, first failure
/// wins.
#[must_use]
pub fn multi_validator(validators: Vec<Validator>) -> Validator {
    Box::new(move |entity| {
        for validator in &validators {
            validator(entity)?;
        }
        Ok(())
    })
}

/// Ensures the object's id is a well formed UUID.
#[must_use]
pub fn uuid_validator() -> Validator {
    let re = Regex::new(r"(?i)^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
        .expect("hard coded regex");
    Box::new(move |entity| {
        if re.is_match(entity.id()) {
            Ok(())
        } else {
            Err(ModelError::Validation(format!(
                "invalid UUID: {}",
                entity.id()
            )))
        }
    })
}

/// Ensures school units carry a valid school unit code; other entity types
/// pass unchanged.
#[must_use]
pub fn school_unit_code_validator() -> Validator {
    let re = Regex::new(r"[0-9]{8}").expect("hard coded regex");
    Box::new(move |entity| {
        let Entity::SchoolUnit(school_unit) = entity else {
            return Ok(());
        };
        if re.is_match(&school_unit.school_unit_code) {
            Ok(())
        } else {
            Err(ModelError::Validation(format!(
                "invalid school unit code: {}",
                school_unit.school_unit_code
            )))
        }
    })
}

/// Convenience constructor for a validator with the specified checks
/// included. A disabled check is simply not added to the pipeline.
#[must_use]
pub fn optional_validator(uuid: bool, school_unit_code: bool) -> Validator {
    let mut validators = Vec::new();
    if uuid {
        validators.push(uuid_validator());
    }
    if school_unit_code {
        validators.push(school_unit_code_validator());
    }
    multi_validator(validators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SchoolUnit, User};
    use crate::ScimName;

    fn user(id: &str) -> Entity {
        Entity::User(User {
            external_id: id.to_string(),
            user_name: "baje@x.se".to_string(),
            name: ScimName {
                family_name: "Jensen".to_string(),
                given_name: "Barbara".to_string(),
            },
            display_name: "Babs".to_string(),
            emails: Vec::new(),
            extension: Default::default(),
            egil_extension: None,
        })
    }

    fn school_unit(id: &str, code: &str) -> Entity {
        Entity::SchoolUnit(SchoolUnit {
            external_id: id.to_string(),
            school_unit_code: code.to_string(),
            display_name: "Skolan".to_string(),
            organisation: None,
            school_unit_group: None,
            school_types: None,
            municipality_code: None,
        })
    }

    #[test]
    fn uuid_validator_accepts_uuids() {
        let validator = uuid_validator();
        assert!(validator(&user("75c666db-e60e-4687-bdd3-1af191fa6799")).is_ok());
        assert!(validator(&user("75C666DB-E60E-4687-BDD3-1AF191FA6799")).is_ok());
    }

    #[test]
    fn uuid_validator_rejects_non_uuids() {
        let validator = uuid_validator();
        assert!(validator(&user("not-a-uuid")).is_err());
        assert!(validator(&user("")).is_err());
    }

    #[test]
    fn school_unit_code_validator_ignores_other_types() {
        let validator = school_unit_code_validator();
        assert!(validator(&user("whatever")).is_ok());
    }

    #[test]
    fn school_unit_code_requires_eight_digits() {
        let validator = school_unit_code_validator();
        assert!(validator(&school_unit("x", "12345678")).is_ok());
        // A substring match: longer codes pass too.
        assert!(validator(&school_unit("x", "код 123456789")).is_ok());
        assert!(validator(&school_unit("x", "1234567")).is_err());
    }

    #[test]
    fn composition_is_first_fail_wins() {
        let validator = multi_validator(vec![uuid_validator(), school_unit_code_validator()]);
        let err = validator(&school_unit("bad-id", "badcode")).unwrap_err();
        assert!(err.to_string().contains("invalid UUID"));
    }

    #[test]
    fn disabled_checks_are_not_added() {
        let validator = optional_validator(false, false);
        assert!(validator(&school_unit("bad-id", "badcode")).is_ok());
    }
}
