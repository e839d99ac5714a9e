//! Per-entity SQL: row shapes, inserts, updates and readers.
//!
//! Each entity type has a main table keyed by `(tenant, id)` and zero or
//! more owned child tables. Updates replace child rows wholesale (delete
//! and re-insert) so collections always end up exactly as the client sent
//! them. All functions run inside the caller's transaction.

mod activity;
mod employment;
mod organisation;
mod school_unit;
mod school_unit_group;
mod student_group;
mod user;

use sqlx::AnyConnection;
use windermere_model::{Entity, ResourceType};

use crate::dialect::Dialect;
use crate::error::StorageError;

/// Insert an entity's main row and all of its child rows.
pub(crate) async fn insert_entity(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    entity: &Entity,
) -> Result<(), StorageError> {
    match entity {
        Entity::User(user) => user::insert(conn, dialect, tenant, user).await,
        Entity::StudentGroup(group) => student_group::insert(conn, dialect, tenant, group).await,
        Entity::Organisation(org) => organisation::insert(conn, dialect, tenant, org).await,
        Entity::SchoolUnitGroup(group) => {
            school_unit_group::insert(conn, dialect, tenant, group).await
        }
        Entity::SchoolUnit(unit) => school_unit::insert(conn, dialect, tenant, unit).await,
        Entity::Employment(employment) => {
            employment::insert(conn, dialect, tenant, employment).await
        }
        Entity::Activity(activity) => activity::insert(conn, dialect, tenant, activity).await,
    }
}

/// Update an entity's main row and replace its child rows.
pub(crate) async fn update_entity(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    entity: &Entity,
) -> Result<(), StorageError> {
    match entity {
        Entity::User(user) => user::update(conn, dialect, tenant, user).await,
        Entity::StudentGroup(group) => student_group::update(conn, dialect, tenant, group).await,
        Entity::Organisation(org) => organisation::update(conn, dialect, tenant, org).await,
        Entity::SchoolUnitGroup(group) => {
            school_unit_group::update(conn, dialect, tenant, group).await
        }
        Entity::SchoolUnit(unit) => school_unit::update(conn, dialect, tenant, unit).await,
        Entity::Employment(employment) => {
            employment::update(conn, dialect, tenant, employment).await
        }
        Entity::Activity(activity) => activity::update(conn, dialect, tenant, activity).await,
    }
}

/// Read every entity of a type for a tenant.
pub(crate) async fn read_all(
    conn: &mut AnyConnection,
    dialect: Dialect,
    resource_type: ResourceType,
    tenant: &str,
) -> Result<Vec<Entity>, StorageError> {
    match resource_type {
        ResourceType::Users => user::read(conn, dialect, tenant, None).await,
        ResourceType::StudentGroups => student_group::read(conn, dialect, tenant, None).await,
        ResourceType::Organisations => organisation::read(conn, dialect, tenant, None).await,
        ResourceType::SchoolUnitGroups => {
            school_unit_group::read(conn, dialect, tenant, None).await
        }
        ResourceType::SchoolUnits => school_unit::read(conn, dialect, tenant, None).await,
        ResourceType::Employments => employment::read(conn, dialect, tenant, None).await,
        ResourceType::Activities => activity::read(conn, dialect, tenant, None).await,
    }
}

/// Read one entity by id; the caller has already checked presence.
pub(crate) async fn read_one(
    conn: &mut AnyConnection,
    dialect: Dialect,
    resource_type: ResourceType,
    tenant: &str,
    id: &str,
) -> Result<Entity, StorageError> {
    let entities = match resource_type {
        ResourceType::Users => user::read(conn, dialect, tenant, Some(id)).await?,
        ResourceType::StudentGroups => student_group::read(conn, dialect, tenant, Some(id)).await?,
        ResourceType::Organisations => organisation::read(conn, dialect, tenant, Some(id)).await?,
        ResourceType::SchoolUnitGroups => {
            school_unit_group::read(conn, dialect, tenant, Some(id)).await?
        }
        ResourceType::SchoolUnits => school_unit::read(conn, dialect, tenant, Some(id)).await?,
        ResourceType::Employments => employment::read(conn, dialect, tenant, Some(id)).await?,
        ResourceType::Activities => activity::read(conn, dialect, tenant, Some(id)).await?,
    };
    let mut entities = entities;
    match entities.len() {
        1 => Ok(entities.remove(0)),
        n => Err(StorageError::Database(sqlx::Error::Protocol(format!(
            "expected one object with id {id}, found {n}"
        )))),
    }
}
