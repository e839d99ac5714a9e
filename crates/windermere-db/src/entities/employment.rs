//! Employments (no child tables).

use sqlx::AnyConnection;
use sqlx::FromRow;
use windermere_model::{Employment, Entity, ScimReference};

use crate::dialect::Dialect;
use crate::error::StorageError;

#[derive(FromRow)]
struct EmploymentRow {
    id: String,
    employed_at: String,
    user_id: String,
    employment_role: String,
    signature: Option<String>,
}

pub(crate) async fn insert(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    employment: &Employment,
) -> Result<(), StorageError> {
    let signature = (!employment.signature.is_empty()).then(|| employment.signature.clone());
    sqlx::query(&dialect.rebind(
        "INSERT INTO Employments (tenant, id, employedAt, userId, employmentRole, signature) \
         VALUES (?, ?, ?, ?, ?, ?)",
    ))
    .bind(tenant)
    .bind(&employment.external_id)
    .bind(&employment.employed_at.value)
    .bind(&employment.user.value)
    .bind(&employment.employment_role)
    .bind(signature)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn update(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    employment: &Employment,
) -> Result<(), StorageError> {
    let signature = (!employment.signature.is_empty()).then(|| employment.signature.clone());
    sqlx::query(&dialect.rebind(
        "UPDATE Employments SET employedAt = ?, userId = ?, employmentRole = ?, signature = ? \
         WHERE tenant = ? AND id = ?",
    ))
    .bind(&employment.employed_at.value)
    .bind(&employment.user.value)
    .bind(&employment.employment_role)
    .bind(signature)
    .bind(tenant)
    .bind(&employment.external_id)
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
        "SELECT id, employedAt AS employed_at, userId AS user_id, \
         employmentRole AS employment_role, signature \
         FROM Employments WHERE tenant = ?{filter}"
    ));
    let mut query = sqlx::query_as::<_, EmploymentRow>(&sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            Entity::Employment(Employment {
                external_id: row.id,
                employed_at: ScimReference::new(row.employed_at),
                user: ScimReference::new(row.user_id),
                employment_role: row.employment_role,
                signature: row.signature.unwrap_or_default(),
            })
        })
        .collect())
}
