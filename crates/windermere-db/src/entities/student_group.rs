//! Student groups and their membership rows.

use std::collections::HashMap;

use sqlx::AnyConnection;
use sqlx::FromRow;
use windermere_model::{Entity, ScimReference, StudentGroup};

use crate::dialect::Dialect;
use crate::error::StorageError;

#[derive(FromRow)]
struct StudentGroupRow {
    id: String,
    display_name: String,
    owner: String,
    group_type: Option<String>,
    school_type: Option<String>,
}

#[derive(FromRow)]
struct MembershipRow {
    group_id: String,
    user_id: String,
}

async fn insert_memberships(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    group: &StudentGroup,
) -> Result<(), StorageError> {
    for membership in &group.student_memberships {
        sqlx::query(&dialect.rebind(
            "INSERT INTO StudentMemberships (tenant, groupId, userId) VALUES (?, ?, ?)",
        ))
        .bind(tenant)
        .bind(&group.external_id)
        .bind(&membership.value)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn insert(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    group: &StudentGroup,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "INSERT INTO StudentGroups (tenant, id, displayName, owner, studentGroupType, schoolType) \
         VALUES (?, ?, ?, ?, ?, ?)",
    ))
    .bind(tenant)
    .bind(&group.external_id)
    .bind(&group.display_name)
    .bind(&group.owner.value)
    .bind(&group.group_type)
    .bind(&group.school_type)
    .execute(&mut *conn)
    .await?;

    insert_memberships(conn, dialect, tenant, group).await
}

pub(crate) async fn update(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    group: &StudentGroup,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "UPDATE StudentGroups SET displayName = ?, owner = ?, studentGroupType = ?, schoolType = ? \
         WHERE tenant = ? AND id = ?",
    ))
    .bind(&group.display_name)
    .bind(&group.owner.value)
    .bind(&group.group_type)
    .bind(&group.school_type)
    .bind(tenant)
    .bind(&group.external_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(&dialect.rebind(
        "DELETE FROM StudentMemberships WHERE tenant = ? AND groupId = ?",
    ))
    .bind(tenant)
    .bind(&group.external_id)
    .execute(&mut *conn)
    .await?;

    insert_memberships(conn, dialect, tenant, group).await
}

pub(crate) async fn read(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    id: Option<&str>,
) -> Result<Vec<Entity>, StorageError> {
    let filter = if id.is_some() { " AND id = ?" } else { "" };
    let child_filter = if id.is_some() { " AND groupId = ?" } else { "" };

    let main_sql = dialect.rebind(&format!(
        "SELECT id, displayName AS display_name, owner, \
         studentGroupType AS group_type, schoolType AS school_type \
         FROM StudentGroups WHERE tenant = ?{filter}"
    ));
    let mut query = sqlx::query_as::<_, StudentGroupRow>(&main_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    let mut groups: Vec<StudentGroup> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        index.insert(row.id.clone(), groups.len());
        groups.push(StudentGroup {
            external_id: row.id,
            display_name: row.display_name,
            owner: ScimReference::new(row.owner),
            group_type: row.group_type,
            student_memberships: Vec::new(),
            school_type: row.school_type,
        });
    }

    let membership_sql = dialect.rebind(&format!(
        "SELECT groupId AS group_id, userId AS user_id \
         FROM StudentMemberships WHERE tenant = ?{child_filter}"
    ));
    let mut query = sqlx::query_as::<_, MembershipRow>(&membership_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    for row in query.fetch_all(&mut *conn).await? {
        if let Some(&i) = index.get(&row.group_id) {
            groups[i]
                .student_memberships
                .push(ScimReference::new(row.user_id));
        }
    }

    Ok(groups.into_iter().map(Entity::StudentGroup).collect())
}
