//! Transformation of SS12000 v2 objects into their SS12000:2018 shape.
//!
//! Objects that have no valid SS12000:2018 representation (a person with
//! no principal name, a duty with no person reference, a school unit with
//! no school unit code) transform to `None` and are silently skipped by
//! the import procedures.

use windermere_model as v1;

use crate::model as v2;

/// URN for eduPersonPrincipalName external identifiers.
const EPPN_URN: &str = "urn:oid:1.3.6.1.4.1.5923.1.1.1.6";

pub fn organisation_to_v1(org: &v2::Organisation) -> v1::Organisation {
    v1::Organisation {
        external_id: org.id.to_string(),
        display_name: org.display_name.clone(),
    }
}

/// Convert an organisation of type Skolenhet to a school unit.
///
/// `None` when the organisation carries no school unit code, which the
/// SS12000:2018 model requires.
pub fn school_unit_to_v1(org: &v2::Organisation) -> Option<v1::SchoolUnit> {
    let school_unit_code = org.school_unit_code.clone()?;
    Some(v1::SchoolUnit {
        external_id: org.id.to_string(),
        school_unit_code,
        display_name: org.display_name.clone(),
        organisation: None,
        school_unit_group: None,
        school_types: org
            .school_types
            .as_ref()
            .map(|types| types.iter().map(|t| school_type_to_v1(t)).collect()),
        municipality_code: org.municipality_code.clone(),
    })
}

/// Mapping table from school types in SS12000 v2.1 to v1.0.
pub fn school_type_to_v1(school_type: &str) -> String {
    let mapped = match school_type {
        "ABU" | "AU" | "KKU" | "KU" | "SFI" | "STF" | "TR" => "AU",
        "FHS" => "FHS",
        "FKLASS" => "FSK",
        "FS" => "FS",
        "FTH" | "OPPFTH" => "FTH",
        "GR" => "GR",
        "GRS" => "GRS",
        "GY" => "GY",
        "GYS" => "GYS",
        "HS" => "HS",
        "SAM" => "SAM",
        "SARVUX" | "SARVUXGR" | "SARVUXGY" | "VUXSARGR" | "VUXSARGY" | "VUXSARTR" => "SUV",
        "SP" => "SP",
        "VUX" | "VUXGR" | "VUXGY" | "VUXSFI" => "VUX",
        "YH" => "YH",
        _ => "",
    };
    mapped.to_string()
}

fn email_to_v1(email: &v2::Email) -> v1::ScimEmail {
    v1::ScimEmail {
        value: email.value.clone(),
        r#type: email.r#type.clone(),
    }
}

fn enrolment_to_v1(enrolment: &v2::Enrolment) -> v1::Enrolment {
    v1::Enrolment {
        value: enrolment.enroled_at.id.to_string(),
        reference: String::new(),
        school_year: enrolment.school_year,
        school_type: enrolment
            .school_type
            .as_deref()
            .map(school_type_to_v1),
        program_code: enrolment.education_code.clone(),
    }
}

fn external_identifier_to_v1(identifier: &v2::ExternalIdentifier) -> v1::ExternalIdentifier {
    v1::ExternalIdentifier {
        value: identifier.value.clone(),
        context: identifier.context.clone(),
        globally_unique: identifier.globally_unique,
    }
}

/// Convert a person to a user.
///
/// `None` when the person has no eduPersonPrincipalName; further EPPNs
/// beyond the first become globally unique external identifiers.
pub fn person_to_v1(person: &v2::Person) -> Option<v1::User> {
    let eppns = person.edu_person_principal_names.as_deref()?;
    let user_name = eppns.first()?.clone();

    let mut egil_extension: Option<v1::EgilUserExtension> = None;
    if eppns.len() > 1 {
        let extension = egil_extension.get_or_insert_with(Default::default);
        for eppn in &eppns[1..] {
            extension.external_identifiers.push(v1::ExternalIdentifier {
                value: eppn.clone(),
                context: EPPN_URN.to_string(),
                globally_unique: true,
            });
        }
    }
    if let Some(identifiers) = &person.external_identifiers {
        let extension = egil_extension.get_or_insert_with(Default::default);
        extension
            .external_identifiers
            .extend(identifiers.iter().map(external_identifier_to_v1));
    }

    Some(v1::User {
        external_id: person.id.to_string(),
        user_name,
        name: v1::ScimName {
            family_name: person.family_name.clone(),
            given_name: person.given_name.clone(),
        },
        display_name: format!("{} {}", person.given_name, person.family_name),
        emails: person
            .emails
            .as_ref()
            .map(|emails| emails.iter().map(email_to_v1).collect())
            .unwrap_or_default(),
        extension: v1::UserExtension {
            enrolments: person
                .enrolments
                .as_ref()
                .map(|enrolments| enrolments.iter().map(enrolment_to_v1).collect())
                .unwrap_or_default(),
            ..Default::default()
        },
        egil_extension,
    })
}

fn group_type_to_v1(group_type: Option<&str>) -> String {
    match group_type {
        Some("Undervisning") => "Undervisning",
        Some("Klass") => "Klass",
        Some("Mentor") => "Mentor",
        Some("Schema") => "Schema",
        _ => "Övrigt",
    }
    .to_string()
}

pub fn group_to_v1(group: &v2::Group) -> v1::StudentGroup {
    v1::StudentGroup {
        external_id: group.id.to_string(),
        display_name: group.display_name.clone(),
        owner: v1::ScimReference::new(group.organisation.id.to_string()),
        group_type: Some(group_type_to_v1(group.group_type.as_deref())),
        student_memberships: group
            .group_memberships
            .as_ref()
            .map(|memberships| {
                memberships
                    .iter()
                    .map(|m| v1::ScimReference::new(m.person.id.to_string()))
                    .collect()
            })
            .unwrap_or_default(),
        school_type: group.school_type.as_deref().map(school_type_to_v1),
    }
}

fn duty_role_to_v1(duty_role: Option<&str>) -> String {
    match duty_role {
        Some("Rektor") => "Rektor",
        Some("Lärare") => "Lärare",
        Some("Förskollärare") => "Förskollärare",
        _ => "Annan personal",
    }
    .to_string()
}

/// Convert a duty to an employment.
///
/// `None` when the duty carries no person reference.
pub fn duty_to_v1(duty: &v2::Duty) -> Option<v1::Employment> {
    let person = duty.person.as_ref()?;
    Some(v1::Employment {
        external_id: duty.id.to_string(),
        employed_at: v1::ScimReference::new(duty.duty_at.id.to_string()),
        user: v1::ScimReference::new(person.id.to_string()),
        employment_role: duty_role_to_v1(duty.duty_role.as_deref()),
        signature: duty.signature.clone().unwrap_or_default(),
    })
}

pub fn activity_to_v1(activity: &v2::Activity) -> v1::Activity {
    v1::Activity {
        external_id: activity.id.to_string(),
        display_name: activity.display_name.clone(),
        owner: v1::ScimReference::new(activity.organisation.id.to_string()),
        groups: activity
            .groups
            .iter()
            .map(|g| v1::ScimReference::new(g.id.to_string()))
            .collect(),
        teachers: activity
            .teachers
            .as_ref()
            .map(|teachers| {
                teachers
                    .iter()
                    .map(|t| v1::ScimReference::new(t.duty.id.to_string()))
                    .collect()
            })
            .unwrap_or_default(),
        parent_activity: Vec::new(),
    }
}
