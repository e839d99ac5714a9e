//! The SCIM storage backend.
//!
//! Every mutating operation runs in a single database transaction: presence
//! pre-check, main-row mutation, then wholesale replacement of owned child
//! rows. Creates fail on an existing `(tenant, id)`, updates and deletes
//! fail on an absent one.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{AnyConnection, AnyPool};
use windermere_model::{Entity, ModelError, ResourceType};

use crate::dialect::Dialect;
use crate::entities;
use crate::error::StorageError;
use crate::migrations;
use crate::pool;

/// Parses (and validates) a raw resource for an endpoint name.
///
/// Returning `Ok(None)` marks the resource type as unknown to the model;
/// the backend then refuses the operation as infrastructure error rather
/// than a client error.
pub type ObjectParser =
    Arc<dyn Fn(&str, &str) -> Result<Option<Entity>, ModelError> + Send + Sync>;

/// SCIM storage over a relational database.
pub struct SqlBackend {
    pool: AnyPool,
    dialect: Dialect,
    parser: ObjectParser,
}

impl SqlBackend {
    /// Wrap an existing pool, running any pending schema migrations.
    pub async fn new(
        pool: AnyPool,
        dialect: Dialect,
        parser: ObjectParser,
    ) -> Result<Self, StorageError> {
        migrations::init_schema(&pool, dialect).await?;
        Ok(Self {
            pool,
            dialect,
            parser,
        })
    }

    /// Connect to `url` (retrying until the database answers) and run any
    /// pending schema migrations.
    pub async fn open(url: &str, parser: ObjectParser) -> Result<Self, StorageError> {
        let (pool, dialect) = pool::connect(url).await?;
        Self::new(pool, dialect, parser).await
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn pool(&self) -> &AnyPool {
        &self.pool
    }

    fn resource_type(&self, resource_type: &str) -> Result<ResourceType, StorageError> {
        resource_type
            .parse()
            .map_err(|()| StorageError::UnknownResourceType(resource_type.to_string()))
    }

    pub(crate) fn parse(
        &self,
        resource_type: &str,
        resource: &str,
    ) -> Result<Entity, StorageError> {
        match (*self.parser)(resource_type, resource) {
            Ok(Some(entity)) => Ok(entity),
            Ok(None) => Err(StorageError::UnknownResourceType(resource_type.to_string())),
            Err(err) => Err(StorageError::MalformedResource(err.to_string())),
        }
    }

    /// Create a resource. Returns the stored entity as JSON.
    pub async fn create(
        &self,
        tenant: &str,
        resource_type: &str,
        resource: &str,
    ) -> Result<String, StorageError> {
        let rt = self.resource_type(resource_type)?;
        let entity = self.parse(resource_type, resource)?;

        let mut tx = self.pool.begin().await?;
        create_in_tx(&mut *tx, self.dialect, tenant, rt, &entity).await?;
        tx.commit().await?;

        Ok(serde_json::to_string(&entity)?)
    }

    /// Replace a resource. Returns the stored entity as JSON.
    pub async fn update(
        &self,
        tenant: &str,
        resource_type: &str,
        resource_id: &str,
        resource: &str,
    ) -> Result<String, StorageError> {
        let rt = self.resource_type(resource_type)?;
        let entity = self.parse(resource_type, resource)?;

        let mut tx = self.pool.begin().await?;
        update_in_tx(&mut *tx, self.dialect, tenant, rt, resource_id, &entity).await?;
        tx.commit().await?;

        Ok(serde_json::to_string(&entity)?)
    }

    /// Delete a resource. Child rows disappear by cascade.
    pub async fn delete(
        &self,
        tenant: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<(), StorageError> {
        let rt = self.resource_type(resource_type)?;

        let mut tx = self.pool.begin().await?;
        delete_in_tx(&mut *tx, self.dialect, tenant, rt, resource_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove everything stored for a tenant, in one transaction.
    pub async fn clear(&self, tenant: &str) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for rt in ResourceType::ALL {
            sqlx::query(&self.dialect.rebind(&format!(
                "DELETE FROM {} WHERE tenant = ?",
                rt.as_str()
            )))
            .bind(tenant)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All resources of a type for a tenant, as id → JSON.
    pub async fn get_resources(
        &self,
        tenant: &str,
        resource_type: &str,
    ) -> Result<HashMap<String, String>, StorageError> {
        let parsed = self.get_parsed_resources(tenant, resource_type).await?;
        let mut result = HashMap::with_capacity(parsed.len());
        for (id, entity) in parsed {
            result.insert(id, serde_json::to_string(&entity)?);
        }
        Ok(result)
    }

    /// One resource as JSON.
    pub async fn get_resource(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<String, StorageError> {
        let entity = self.get_parsed_resource(tenant, resource_type, id).await?;
        Ok(serde_json::to_string(&entity)?)
    }

    /// All resources of a type for a tenant, as typed entities.
    pub async fn get_parsed_resources(
        &self,
        tenant: &str,
        resource_type: &str,
    ) -> Result<HashMap<String, Entity>, StorageError> {
        let rt = self.resource_type(resource_type)?;
        let mut tx = self.pool.begin().await?;
        let entities = entities::read_all(&mut *tx, self.dialect, rt, tenant).await?;
        tx.commit().await?;
        Ok(entities
            .into_iter()
            .map(|entity| (entity.id().to_string(), entity))
            .collect())
    }

    /// One resource as a typed entity.
    pub async fn get_parsed_resource(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<Entity, StorageError> {
        let rt = self.resource_type(resource_type)?;
        let mut tx = self.pool.begin().await?;
        ensure_has_record(&mut *tx, self.dialect, rt, tenant, id).await?;
        let entity = entities::read_one(&mut *tx, self.dialect, rt, tenant, id).await?;
        tx.commit().await?;
        Ok(entity)
    }
}

pub(crate) async fn ensure_has_record(
    conn: &mut AnyConnection,
    dialect: Dialect,
    resource_type: ResourceType,
    tenant: &str,
    id: &str,
) -> Result<(), StorageError> {
    let sql = dialect.rebind(&format!(
        "SELECT 1 FROM {} WHERE tenant = ? AND id = ?",
        resource_type.as_str()
    ));
    let row = sqlx::query(&sql)
        .bind(tenant)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(_) => Ok(()),
        None => Err(StorageError::MissingResource(id.to_string())),
    }
}

pub(crate) async fn ensure_doesnt_have_record(
    conn: &mut AnyConnection,
    dialect: Dialect,
    resource_type: ResourceType,
    tenant: &str,
    id: &str,
) -> Result<(), StorageError> {
    match ensure_has_record(conn, dialect, resource_type, tenant, id).await {
        Ok(()) => Err(StorageError::Conflict(id.to_string())),
        Err(StorageError::MissingResource(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

pub(crate) async fn create_in_tx(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    resource_type: ResourceType,
    entity: &Entity,
) -> Result<(), StorageError> {
    ensure_doesnt_have_record(conn, dialect, resource_type, tenant, entity.id()).await?;
    entities::insert_entity(conn, dialect, tenant, entity).await
}

pub(crate) async fn update_in_tx(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    resource_type: ResourceType,
    resource_id: &str,
    entity: &Entity,
) -> Result<(), StorageError> {
    ensure_has_record(conn, dialect, resource_type, tenant, resource_id).await?;
    entities::update_entity(conn, dialect, tenant, entity).await
}

pub(crate) async fn delete_in_tx(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    resource_type: ResourceType,
    resource_id: &str,
) -> Result<(), StorageError> {
    ensure_has_record(conn, dialect, resource_type, tenant, resource_id).await?;
    sqlx::query(&dialect.rebind(&format!(
        "DELETE FROM {} WHERE tenant = ? AND id = ?",
        resource_type.as_str()
    )))
    .bind(tenant)
    .bind(resource_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
