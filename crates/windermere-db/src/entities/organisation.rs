//! Organisations (id and display name only, no child tables).

use sqlx::AnyConnection;
use sqlx::FromRow;
use windermere_model::{Entity, Organisation};

use crate::dialect::Dialect;
use crate::error::StorageError;

#[derive(FromRow)]
struct OrganisationRow {
    id: String,
    display_name: String,
}

pub(crate) async fn insert(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    org: &Organisation,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "INSERT INTO Organisations (tenant, id, displayName) VALUES (?, ?, ?)",
    ))
    .bind(tenant)
    .bind(&org.external_id)
    .bind(&org.display_name)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    org: &Organisation,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "UPDATE Organisations SET displayName = ? WHERE tenant = ? AND id = ?",
    ))
    .bind(&org.display_name)
    .bind(tenant)
    .bind(&org.external_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn read(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    id: Option<&str>,
) -> Result<Vec<Entity>, StorageError> {
    let filter = if id.is_some() { " AND id = ?" } else { "" };
    let sql = dialect.rebind(&format!(
        "SELECT id, displayName AS display_name FROM Organisations WHERE tenant = ?{filter}"
    ));
    let mut query = sqlx::query_as::<_, OrganisationRow>(&sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            Entity::Organisation(Organisation {
                external_id: row.id,
                display_name: row.display_name,
            })
        })
        .collect())
}
