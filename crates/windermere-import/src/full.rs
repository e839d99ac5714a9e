//! The full import procedure.
//!
//! Fetches every object of every relevant type from the remote, replaces
//! the tenant's data wholesale (`delete_others = true`), and records the
//! per-query-type watermarks. The order matters for dependent data:
//! principal organisations, school units, persons, groups, duties,
//! activities.

use std::collections::HashSet;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;
use windermere_model::{Entity, ResourceType};

use crate::client::{OrganisationType, Ss12000Client};
use crate::error::ImportError;
use crate::history::ImportHistory;
use crate::model::meta_timestamps;
use crate::reconcile::ReconcileBackend;
use crate::to_v1;

pub(crate) async fn record_timestamps<'a, T: 'a>(
    history: &dyn ImportHistory,
    query_type: &str,
    objects: &'a [T],
    meta: impl Fn(&'a T) -> Option<&'a crate::model::Meta>,
) -> Result<(), ImportError> {
    let (created, modified) = meta_timestamps(objects.iter().map(meta));
    history
        .record_most_recent(&created, &modified, query_type)
        .await
}

/// Run one full import for a tenant.
///
/// Objects already in the backend but no longer presented by the remote
/// are removed. On success the deleted-entities cursor is stamped with the
/// import's start time so the first incremental run doesn't page through
/// deletions from the beginning of time.
pub async fn full_import(
    token: &CancellationToken,
    tenant: &str,
    client: &Ss12000Client,
    backend: &ReconcileBackend,
    history: &dyn ImportHistory,
) -> Result<(), ImportError> {
    info!(tenant, "starting full SS12000 import");
    let started_at = Utc::now();

    // Principal organisations
    let orgs = client
        .organisation_reader(token, OrganisationType::Huvudman, None, None)
        .collect_all()
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get principal organisations: {e}")))?;
    let v1_orgs: Vec<Entity> = orgs
        .iter()
        .map(|org| Entity::Organisation(to_v1::organisation_to_v1(org)))
        .collect();
    backend
        .replace(token, tenant, ResourceType::Organisations, &v1_orgs, true)
        .await?;
    record_timestamps(history, "PrincipalOrganisations", &orgs, |o| o.meta.as_ref()).await?;

    // School units
    let units = client
        .organisation_reader(token, OrganisationType::Skolenhet, None, None)
        .collect_all()
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get school units: {e}")))?;
    let school_unit_ids: HashSet<Uuid> = units.iter().map(|unit| unit.id).collect();
    let v1_units: Vec<Entity> = units
        .iter()
        .filter_map(to_v1::school_unit_to_v1)
        .map(Entity::SchoolUnit)
        .collect();
    backend
        .replace(token, tenant, ResourceType::SchoolUnits, &v1_units, true)
        .await?;
    record_timestamps(history, "SchoolUnitOrganisations", &units, |o| {
        o.meta.as_ref()
    })
    .await?;

    // Persons
    let persons = client
        .person_reader(token, None, None)
        .collect_all()
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get persons: {e}")))?;
    let v1_users: Vec<Entity> = persons
        .iter()
        .filter_map(to_v1::person_to_v1)
        .map(Entity::User)
        .collect();
    backend
        .replace(token, tenant, ResourceType::Users, &v1_users, true)
        .await?;
    record_timestamps(history, "Persons", &persons, |o| o.meta.as_ref()).await?;

    // Groups; groups owned by organisations we don't represent are skipped
    let groups = client
        .group_reader(token, None, None)
        .collect_all()
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get groups: {e}")))?;
    let v1_groups: Vec<Entity> = groups
        .iter()
        .filter(|group| school_unit_ids.contains(&group.organisation.id))
        .map(|group| Entity::StudentGroup(to_v1::group_to_v1(group)))
        .collect();
    backend
        .replace(token, tenant, ResourceType::StudentGroups, &v1_groups, true)
        .await?;
    record_timestamps(history, "Groups", &groups, |o| o.meta.as_ref()).await?;

    // Duties
    let duties = client
        .duty_reader(token, None, None)
        .collect_all()
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get duties: {e}")))?;
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
            true,
        )
        .await?;
    record_timestamps(history, "Duties", &duties, |o| o.meta.as_ref()).await?;

    // Activities
    let activities = client
        .activity_reader(token, None, None)
        .collect_all()
        .await
        .map_err(|e| ImportError::Remote(format!("failed to get activities: {e}")))?;
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
            true,
        )
        .await?;
    record_timestamps(history, "Activities", &activities, |o| o.meta.as_ref()).await?;

    // We haven't polled deletedEntities yet, but the first incremental
    // import shouldn't be handed deletions from before this refresh.
    history.set_last_deleted_entities_call(started_at).await?;

    info!(tenant, "full SS12000 import done");
    Ok(())
}
