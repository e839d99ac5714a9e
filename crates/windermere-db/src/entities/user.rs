//! Users and their owned child rows (emails, enrolments, external
//! identifiers).

use std::collections::HashMap;

use sqlx::AnyConnection;
use sqlx::FromRow;
use windermere_model::{
    EgilUserExtension, Enrolment, Entity, ExternalIdentifier, ScimEmail, ScimName, User,
};

use crate::dialect::Dialect;
use crate::error::StorageError;

#[derive(FromRow)]
struct UserRow {
    id: String,
    user_name: String,
    family_name: String,
    given_name: String,
    display_name: String,
}

#[derive(FromRow)]
struct EmailRow {
    user_id: String,
    value: String,
    #[sqlx(rename = "type")]
    r#type: Option<String>,
}

#[derive(FromRow)]
struct EnrolmentRow {
    user_id: String,
    value: String,
    school_year: Option<i32>,
}

#[derive(FromRow)]
struct ExternalIdentifierRow {
    user_id: String,
    value: String,
    context: Option<String>,
    globally_unique: i32,
}

async fn insert_children(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    user: &User,
) -> Result<(), StorageError> {
    for email in &user.emails {
        let email_type = (!email.r#type.is_empty()).then(|| email.r#type.clone());
        sqlx::query(&dialect.rebind(
            "INSERT INTO Emails (tenant, userId, value, type) VALUES (?, ?, ?, ?)",
        ))
        .bind(tenant)
        .bind(&user.external_id)
        .bind(&email.value)
        .bind(email_type)
        .execute(&mut *conn)
        .await?;
    }

    for enrolment in &user.extension.enrolments {
        sqlx::query(&dialect.rebind(
            "INSERT INTO Enrolments (tenant, userId, value, schoolYear) VALUES (?, ?, ?, ?)",
        ))
        .bind(tenant)
        .bind(&user.external_id)
        .bind(&enrolment.value)
        .bind(enrolment.school_year)
        .execute(&mut *conn)
        .await?;
    }

    if let Some(extension) = &user.egil_extension {
        for identifier in &extension.external_identifiers {
            sqlx::query(&dialect.rebind(
                "INSERT INTO ExternalIdentifiers (tenant, userId, value, context, globallyUnique) \
                 VALUES (?, ?, ?, ?, ?)",
            ))
            .bind(tenant)
            .bind(&user.external_id)
            .bind(&identifier.value)
            .bind(&identifier.context)
            .bind(i32::from(identifier.globally_unique))
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

pub(crate) async fn insert(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    user: &User,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "INSERT INTO Users (tenant, id, userName, familyName, givenName, displayName) \
         VALUES (?, ?, ?, ?, ?, ?)",
    ))
    .bind(tenant)
    .bind(&user.external_id)
    .bind(&user.user_name)
    .bind(&user.name.family_name)
    .bind(&user.name.given_name)
    .bind(&user.display_name)
    .execute(&mut *conn)
    .await?;

    insert_children(conn, dialect, tenant, user).await
}

pub(crate) async fn update(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    user: &User,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "UPDATE Users SET userName = ?, familyName = ?, givenName = ?, displayName = ? \
         WHERE tenant = ? AND id = ?",
    ))
    .bind(&user.user_name)
    .bind(&user.name.family_name)
    .bind(&user.name.given_name)
    .bind(&user.display_name)
    .bind(tenant)
    .bind(&user.external_id)
    .execute(&mut *conn)
    .await?;

    for table in ["Emails", "Enrolments", "ExternalIdentifiers"] {
        sqlx::query(&dialect.rebind(&format!(
            "DELETE FROM {table} WHERE tenant = ? AND userId = ?"
        )))
        .bind(tenant)
        .bind(&user.external_id)
        .execute(&mut *conn)
        .await?;
    }

    insert_children(conn, dialect, tenant, user).await
}

pub(crate) async fn read(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    id: Option<&str>,
) -> Result<Vec<Entity>, StorageError> {
    let filter = if id.is_some() { " AND id = ?" } else { "" };
    let child_filter = if id.is_some() { " AND userId = ?" } else { "" };

    let main_sql = dialect.rebind(&format!(
        "SELECT id, userName AS user_name, familyName AS family_name, \
         givenName AS given_name, displayName AS display_name \
         FROM Users WHERE tenant = ?{filter}"
    ));
    let mut query = sqlx::query_as::<_, UserRow>(&main_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    let mut users: Vec<User> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        index.insert(row.id.clone(), users.len());
        users.push(User {
            external_id: row.id,
            user_name: row.user_name,
            name: ScimName {
                family_name: row.family_name,
                given_name: row.given_name,
            },
            display_name: row.display_name,
            emails: Vec::new(),
            extension: Default::default(),
            egil_extension: None,
        });
    }

    let email_sql = dialect.rebind(&format!(
        "SELECT userId AS user_id, value, type FROM Emails WHERE tenant = ?{child_filter}"
    ));
    let mut query = sqlx::query_as::<_, EmailRow>(&email_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    for row in query.fetch_all(&mut *conn).await? {
        if let Some(&i) = index.get(&row.user_id) {
            users[i].emails.push(ScimEmail {
                value: row.value,
                r#type: row.r#type.unwrap_or_default(),
            });
        }
    }

    let enrolment_sql = dialect.rebind(&format!(
        "SELECT userId AS user_id, value, schoolYear AS school_year \
         FROM Enrolments WHERE tenant = ?{child_filter}"
    ));
    let mut query = sqlx::query_as::<_, EnrolmentRow>(&enrolment_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    for row in query.fetch_all(&mut *conn).await? {
        if let Some(&i) = index.get(&row.user_id) {
            users[i].extension.enrolments.push(Enrolment {
                value: row.value,
                school_year: row.school_year,
                ..Default::default()
            });
        }
    }

    let identifier_sql = dialect.rebind(&format!(
        "SELECT userId AS user_id, value, context, globallyUnique AS globally_unique \
         FROM ExternalIdentifiers WHERE tenant = ?{child_filter}"
    ));
    let mut query = sqlx::query_as::<_, ExternalIdentifierRow>(&identifier_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    for row in query.fetch_all(&mut *conn).await? {
        if let Some(&i) = index.get(&row.user_id) {
            users[i]
                .egil_extension
                .get_or_insert_with(EgilUserExtension::default)
                .external_identifiers
                .push(ExternalIdentifier {
                    value: row.value,
                    context: row.context.unwrap_or_default(),
                    globally_unique: row.globally_unique != 0,
                });
        }
    }

    Ok(users.into_iter().map(Entity::User).collect())
}
