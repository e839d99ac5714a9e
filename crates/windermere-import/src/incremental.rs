//! The incremental import procedure.
//!
//! Fetches only objects created or modified since the per-query-type
//! watermarks, upserts them (never deleting others), and applies the
//! remote's deleted-entities feed, except for ids that also appeared as
//! created/modified, where the later resurrection wins over the earlier
//! delete.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;
use windermere_model::{Entity, ResourceType};

use crate::client::{OrganisationType, Ss12000Client};
use crate::error::ImportError;
use crate::full::record_timestamps;
use crate::history::ImportHistory;
use crate::model::{Activity, Duty, Group, Organisation, Person};
use crate::reconcile::ReconcileBackend;
use crate::to_v1;

/// The endpoint names passed to the deleted-entities feed.
const DELETED_ENTITY_TYPES: [&str; 5] = ["Organisation", "Person", "Group", "Duty", "Activity"];

/// The deleted-entities feed as per-type id sets.
#[derive(Debug, Default)]
struct DeletedEntities {
    organisations: HashSet<Uuid>,
    persons: HashSet<Uuid>,
    groups: HashSet<Uuid>,
    duties: HashSet<Uuid>,
    activities: HashSet<Uuid>,
}

/// Union two change lists by object id; the first occurrence wins.
fn append_unique<T>(first: Vec<T>, second: Vec<T>, id: impl Fn(&T) -> Uuid) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(first.len() + second.len());
    for object in first.into_iter().chain(second) {
        if seen.insert(id(&object)) {
            result.push(object);
        }
    }
    result
}

fn is_after(value: DateTime<Utc>, threshold: Option<DateTime<Utc>>) -> bool {
    threshold.map_or(true, |threshold| value > threshold)
}

async fn changed_since(
    history: &dyn ImportHistory,
    query_type: &str,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ImportError> {
    let created_after = history.most_recently_created(query_type).await?;
    let modified_after = history.most_recently_modified(query_type).await?;
    Ok((created_after, modified_after))
}

/// Run one incremental import for a tenant.
pub async fn incremental_import(
    token: &CancellationToken,
    tenant: &str,
    client: &Ss12000Client,
    backend: &ReconcileBackend,
    history: &dyn ImportHistory,
) -> Result<(), ImportError> {
    info!(tenant, "starting incremental SS12000 import");

    let deleted_entities_call_at = Utc::now();
    let cursor = history.last_deleted_entities_call().await?;

    let feed = client
        .all_deleted_entities(token, cursor, &DELETED_ENTITY_TYPES)
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get deleted entities: {e}")))?;
    let mut deleted = DeletedEntities {
        organisations: feed.organisations.unwrap_or_default().into_iter().collect(),
        persons: feed.persons.unwrap_or_default().into_iter().collect(),
        groups: feed.groups.unwrap_or_default().into_iter().collect(),
        duties: feed.duties.unwrap_or_default().into_iter().collect(),
        activities: feed.activities.unwrap_or_default().into_iter().collect(),
    };

    // Principal organisations
    let (created_after, modified_after) = changed_since(history, "PrincipalOrganisations").await?;
    let created: Vec<Organisation> = client
        .organisation_reader(token, OrganisationType::Huvudman, created_after, None)
        .collect_all()
        .await?;
    let modified: Vec<Organisation> = client
        .organisation_reader(token, OrganisationType::Huvudman, None, modified_after)
        .collect_all()
        .await?;
    let orgs = append_unique(created, modified, |o| o.id);
    for org in &orgs {
        deleted.organisations.remove(&org.id);
    }
    let v1_orgs: Vec<Entity> = orgs
        .iter()
        .map(|org| Entity::Organisation(to_v1::organisation_to_v1(org)))
        .collect();
    backend
        .replace(token, tenant, ResourceType::Organisations, &v1_orgs, false)
        .await?;
    record_timestamps(history, "PrincipalOrganisations", &orgs, |o| o.meta.as_ref()).await?;

    // School unit organisations. The full set is fetched unfiltered so we
    // can tell which groups belong to school units we represent; the
    // recently changed subset is filtered locally on meta.
    let (created_after, modified_after) = changed_since(history, "SchoolUnitOrganisations").await?;
    let all_units: Vec<Organisation> = client
        .organisation_reader(token, OrganisationType::Skolenhet, None, None)
        .collect_all()
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get school units: {e}")))?;

    let mut school_unit_ids: HashSet<Uuid> = HashSet::with_capacity(all_units.len());
    let mut changed_units = Vec::new();
    for unit in all_units {
        school_unit_ids.insert(unit.id);
        let changed = unit.meta.as_ref().map_or(true, |meta| {
            is_after(meta.created, created_after) || is_after(meta.modified, modified_after)
        });
        if changed {
            changed_units.push(unit);
        }
    }
    for unit in &changed_units {
        deleted.organisations.remove(&unit.id);
    }
    let v1_units: Vec<Entity> = changed_units
        .iter()
        .filter_map(to_v1::school_unit_to_v1)
        .map(Entity::SchoolUnit)
        .collect();
    backend
        .replace(token, tenant, ResourceType::SchoolUnits, &v1_units, false)
        .await?;
    record_timestamps(history, "SchoolUnitOrganisations", &changed_units, |o| {
        o.meta.as_ref()
    })
    .await?;

    // Persons
    let (created_after, modified_after) = changed_since(history, "Persons").await?;
    let created: Vec<Person> = client
        .person_reader(token, created_after, None)
        .collect_all()
        .await?;
    let modified: Vec<Person> = client
        .person_reader(token, None, modified_after)
        .collect_all()
        .await?;
    let persons = append_unique(created, modified, |p| p.id);
    for person in &persons {
        deleted.persons.remove(&person.id);
    }
    let v1_users: Vec<Entity> = persons
        .iter()
        .filter_map(to_v1::person_to_v1)
        .map(Entity::User)
        .collect();
    backend
        .replace(token, tenant, ResourceType::Users, &v1_users, false)
        .await?;
    record_timestamps(history, "Persons", &persons, |o| o.meta.as_ref()).await?;

    // Groups
    let (created_after, modified_after) = changed_since(history, "Groups").await?;
    let created: Vec<Group> = client
        .group_reader(token, created_after, None)
        .collect_all()
        .await?;
    let modified: Vec<Group> = client
        .group_reader(token, None, modified_after)
        .collect_all()
        .await?;
    let groups = append_unique(created, modified, |g| g.id);
    for group in &groups {
        deleted.groups.remove(&group.id);
    }
    let v1_groups: Vec<Entity> = groups
        .iter()
        .filter(|group| school_unit_ids.contains(&group.organisation.id))
        .map(|group| Entity::StudentGroup(to_v1::group_to_v1(group)))
        .collect();
    backend
        .replace(
            token,
            tenant,
            ResourceType::StudentGroups,
            &v1_groups,
            false,
        )
        .await?;
    record_timestamps(history, "Groups", &groups, |o| o.meta.as_ref()).await?;

    // Duties
    let (created_after, modified_after) = changed_since(history, "Duties").await?;
    let created: Vec<Duty> = client
        .duty_reader(token, created_after, None)
        .collect_all()
        .await?;
    let modified: Vec<Duty> = client
        .duty_reader(token, None, modified_after)
        .collect_all()
        .await?;
    let duties = append_unique(created, modified, |d| d.id);
    for duty in &duties {
        deleted.duties.remove(&duty.id);
    }
    let v1_employments: Vec<Entity> = duties
        .iter()
        .filter_map(to_v1::duty_to_v1)
        .map(Entity::Employment)
        .collect();
    backend
        .replace(
            token,
            tenant,
            ResourceType::Employments,
            &v1_employments,
            false,
        )
        .await?;
    record_timestamps(history, "Duties", &duties, |o| o.meta.as_ref()).await?;

    // Activities
    let (created_after, modified_after) = changed_since(history, "Activities").await?;
    let created: Vec<Activity> = client
        .activity_reader(token, created_after, None)
        .collect_all()
        .await?;
    let modified: Vec<Activity> = client
        .activity_reader(token, None, modified_after)
        .collect_all()
        .await?;
    let activities = append_unique(created, modified, |a| a.id);
    for activity in &activities {
        deleted.activities.remove(&activity.id);
    }
    let v1_activities: Vec<Entity> = activities
        .iter()
        .map(|activity| Entity::Activity(to_v1::activity_to_v1(activity)))
        .collect();
    backend
        .replace(
            token,
            tenant,
            ResourceType::Activities,
            &v1_activities,
            false,
        )
        .await?;
    record_timestamps(history, "Activities", &activities, |o| o.meta.as_ref()).await?;

    // Apply the remaining deletions. A deleted v2 organisation may have
    // been either a school unit or an organisation on our side.
    let organisations: Vec<Uuid> = deleted.organisations.into_iter().collect();
    backend
        .delete_ids(
            token,
            tenant,
            &[ResourceType::SchoolUnits, ResourceType::Organisations],
            &organisations,
        )
        .await?;
    let groups: Vec<Uuid> = deleted.groups.into_iter().collect();
    backend
        .delete_ids(token, tenant, &[ResourceType::StudentGroups], &groups)
        .await?;
    let persons: Vec<Uuid> = deleted.persons.into_iter().collect();
    backend
        .delete_ids(token, tenant, &[ResourceType::Users], &persons)
        .await?;
    let activities: Vec<Uuid> = deleted.activities.into_iter().collect();
    backend
        .delete_ids(token, tenant, &[ResourceType::Activities], &activities)
        .await?;
    let duties: Vec<Uuid> = deleted.duties.into_iter().collect();
    backend
        .delete_ids(token, tenant, &[ResourceType::Employments], &duties)
        .await?;

    // All deletions done; only now is it safe to advance the cursor.
    history
        .set_last_deleted_entities_call(deleted_entities_call_at)
        .await?;

    info!(tenant, "incremental SS12000 import done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_unique_prefers_the_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let merged = append_unique(vec![(a, 1), (b, 2)], vec![(b, 3), (c, 4)], |pair| pair.0);
        assert_eq!(merged, vec![(a, 1), (b, 2), (c, 4)]);
    }

    #[test]
    fn is_after_treats_missing_threshold_as_always() {
        let t = Utc::now();
        assert!(is_after(t, None));
        assert!(!is_after(t, Some(t)));
        assert!(is_after(t, Some(t - chrono::Duration::seconds(1))));
    }
}
