//! Activities and their teacher/group reference rows.

use std::collections::HashMap;

use sqlx::AnyConnection;
use sqlx::FromRow;
use windermere_model::{Activity, Entity, ScimReference};

use crate::dialect::Dialect;
use crate::error::StorageError;

#[derive(FromRow)]
struct ActivityRow {
    id: String,
    display_name: String,
    owner: String,
}

#[derive(FromRow)]
struct TeacherRow {
    activity_id: String,
    employment_id: String,
}

#[derive(FromRow)]
struct GroupRow {
    activity_id: String,
    group_id: String,
}

async fn insert_children(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    activity: &Activity,
) -> Result<(), StorageError> {
    for teacher in &activity.teachers {
        sqlx::query(&dialect.rebind(
            "INSERT INTO ActivityTeachers (tenant, activityId, employmentId) VALUES (?, ?, ?)",
        ))
        .bind(tenant)
        .bind(&activity.external_id)
        .bind(&teacher.value)
        .execute(&mut *conn)
        .await?;
    }
    for group in &activity.groups {
        sqlx::query(&dialect.rebind(
            "INSERT INTO ActivityGroups (tenant, activityId, groupId) VALUES (?, ?, ?)",
        ))
        .bind(tenant)
        .bind(&activity.external_id)
        .bind(&group.value)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn insert(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    activity: &Activity,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "INSERT INTO Activities (tenant, id, displayName, owner) VALUES (?, ?, ?, ?)",
    ))
    .bind(tenant)
    .bind(&activity.external_id)
    .bind(&activity.display_name)
    .bind(&activity.owner.value)
    .execute(&mut *conn)
    .await?;

    insert_children(conn, dialect, tenant, activity).await
}

pub(crate) async fn update(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    activity: &Activity,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "UPDATE Activities SET displayName = ?, owner = ? WHERE tenant = ? AND id = ?",
    ))
    .bind(&activity.display_name)
    .bind(&activity.owner.value)
    .bind(tenant)
    .bind(&activity.external_id)
    .execute(&mut *conn)
    .await?;

    for table in ["ActivityTeachers", "ActivityGroups"] {
        sqlx::query(&dialect.rebind(&format!(
            "DELETE FROM {table} WHERE tenant = ? AND activityId = ?"
        )))
        .bind(tenant)
        .bind(&activity.external_id)
        .execute(&mut *conn)
        .await?;
    }

    insert_children(conn, dialect, tenant, activity).await
}

pub(crate) async fn read(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    id: Option<&str>,
) -> Result<Vec<Entity>, StorageError> {
    let filter = if id.is_some() { " AND id = ?" } else { "" };
    let child_filter = if id.is_some() { " AND activityId = ?" } else { "" };

    let main_sql = dialect.rebind(&format!(
        "SELECT id, displayName AS display_name, owner \
         FROM Activities WHERE tenant = ?{filter}"
    ));
    let mut query = sqlx::query_as::<_, ActivityRow>(&main_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    let mut activities: Vec<Activity> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        index.insert(row.id.clone(), activities.len());
        activities.push(Activity {
            external_id: row.id,
            display_name: row.display_name,
            owner: ScimReference::new(row.owner),
            groups: Vec::new(),
            teachers: Vec::new(),
            parent_activity: Vec::new(),
        });
    }

    let teachers_sql = dialect.rebind(&format!(
        "SELECT activityId AS activity_id, employmentId AS employment_id \
         FROM ActivityTeachers WHERE tenant = ?{child_filter}"
    ));
    let mut query = sqlx::query_as::<_, TeacherRow>(&teachers_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    for row in query.fetch_all(&mut *conn).await? {
        if let Some(&i) = index.get(&row.activity_id) {
            activities[i]
                .teachers
                .push(ScimReference::new(row.employment_id));
        }
    }

    let groups_sql = dialect.rebind(&format!(
        "SELECT activityId AS activity_id, groupId AS group_id \
         FROM ActivityGroups WHERE tenant = ?{child_filter}"
    ));
    let mut query = sqlx::query_as::<_, GroupRow>(&groups_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    for row in query.fetch_all(&mut *conn).await? {
        if let Some(&i) = index.get(&row.activity_id) {
            activities[i].groups.push(ScimReference::new(row.group_id));
        }
    }

    Ok(activities.into_iter().map(Entity::Activity).collect())
}
