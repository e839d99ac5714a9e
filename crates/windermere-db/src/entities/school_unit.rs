//! School units and their school type rows.

use std::collections::HashMap;

use sqlx::AnyConnection;
use sqlx::FromRow;
use windermere_model::{Entity, SchoolUnit, ScimReference};

use crate::dialect::Dialect;
use crate::error::StorageError;

#[derive(FromRow)]
struct SchoolUnitRow {
    id: String,
    display_name: String,
    school_unit_code: String,
    organisation: Option<String>,
    school_unit_group: Option<String>,
    municipality_code: Option<String>,
}

#[derive(FromRow)]
struct SchoolTypeRow {
    school_unit_id: String,
    school_type: String,
}

async fn insert_school_types(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    unit: &SchoolUnit,
) -> Result<(), StorageError> {
    let Some(school_types) = &unit.school_types else {
        return Ok(());
    };
    for school_type in school_types {
        sqlx::query(&dialect.rebind(
            "INSERT INTO SchoolTypes (tenant, schoolUnitId, schoolType) VALUES (?, ?, ?)",
        ))
        .bind(tenant)
        .bind(&unit.external_id)
        .bind(school_type)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn insert(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    unit: &SchoolUnit,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "INSERT INTO SchoolUnits \
         (tenant, id, displayName, schoolUnitCode, organisation, schoolUnitGroup, municipalityCode) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    ))
    .bind(tenant)
    .bind(&unit.external_id)
    .bind(&unit.display_name)
    .bind(&unit.school_unit_code)
    .bind(unit.organisation.as_ref().map(|r| r.value.clone()))
    .bind(unit.school_unit_group.as_ref().map(|r| r.value.clone()))
    .bind(&unit.municipality_code)
    .execute(&mut *conn)
    .await?;

    insert_school_types(conn, dialect, tenant, unit).await
}

pub(crate) async fn update(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    unit: &SchoolUnit,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind(
        "UPDATE SchoolUnits SET displayName = ?, schoolUnitCode = ?, organisation = ?, \
         schoolUnitGroup = ?, municipalityCode = ? WHERE tenant = ? AND id = ?",
    ))
    .bind(&unit.display_name)
    .bind(&unit.school_unit_code)
    .bind(unit.organisation.as_ref().map(|r| r.value.clone()))
    .bind(unit.school_unit_group.as_ref().map(|r| r.value.clone()))
    .bind(&unit.municipality_code)
    .bind(tenant)
    .bind(&unit.external_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(&dialect.rebind(
        "DELETE FROM SchoolTypes WHERE tenant = ? AND schoolUnitId = ?",
    ))
    .bind(tenant)
    .bind(&unit.external_id)
    .execute(&mut *conn)
    .await?;

    insert_school_types(conn, dialect, tenant, unit).await
}

pub(crate) async fn read(
    conn: &mut AnyConnection,
    dialect: Dialect,
    tenant: &str,
    id: Option<&str>,
) -> Result<Vec<Entity>, StorageError> {
    let filter = if id.is_some() { " AND id = ?" } else { "" };
    let child_filter = if id.is_some() { " AND schoolUnitId = ?" } else { "" };

    let main_sql = dialect.rebind(&format!(
        "SELECT id, displayName AS display_name, schoolUnitCode AS school_unit_code, \
         organisation, schoolUnitGroup AS school_unit_group, \
         municipalityCode AS municipality_code \
         FROM SchoolUnits WHERE tenant = ?{filter}"
    ));
    let mut query = sqlx::query_as::<_, SchoolUnitRow>(&main_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    let mut units: Vec<SchoolUnit> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        index.insert(row.id.clone(), units.len());
        units.push(SchoolUnit {
            external_id: row.id,
            school_unit_code: row.school_unit_code,
            display_name: row.display_name,
            organisation: row.organisation.map(ScimReference::new),
            school_unit_group: row.school_unit_group.map(ScimReference::new),
            school_types: None,
            municipality_code: row.municipality_code,
        });
    }

    let types_sql = dialect.rebind(&format!(
        "SELECT schoolUnitId AS school_unit_id, schoolType AS school_type \
         FROM SchoolTypes WHERE tenant = ?{child_filter}"
    ));
    let mut query = sqlx::query_as::<_, SchoolTypeRow>(&types_sql).bind(tenant);
    if let Some(id) = id {
        query = query.bind(id);
    }
    for row in query.fetch_all(&mut *conn).await? {
        if let Some(&i) = index.get(&row.school_unit_id) {
            units[i]
                .school_types
                .get_or_insert_with(Vec::new)
                .push(row.school_type);
        }
    }

    Ok(units.into_iter().map(Entity::SchoolUnit).collect())
}
