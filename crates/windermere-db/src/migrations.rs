//! Versioned schema migrations with a paired downgrade path.
//!
//! The migration list is ordered and append-only. Version N is reached by
//! running migrations `1..=N` in order; downgrading to M runs the downgrade
//! snippets `N..M` in reverse. A `windermere_meta` table holds the single
//! current version number.

use sqlx::AnyPool;
use sqlx::{Any, Row, Transaction};
use tracing::info;

use crate::dialect::Dialect;
use crate::error::StorageError;
use crate::pool;

const MIGRATIONS: [&str; 2] = [
    // v1, initial schema version
    r#"
    CREATE TABLE windermere_meta (
        version INT NOT NULL
    );

    INSERT INTO windermere_meta (version) VALUES (1);

    CREATE TABLE Users (
        tenant {{NVARCHAR}}(255) NOT NULL,
        id VARCHAR(36) NOT NULL,
        userName {{NTEXT}} NOT NULL,
        familyName {{NTEXT}} NOT NULL,
        givenName {{NTEXT}} NOT NULL,
        displayName {{NTEXT}} NOT NULL,
        PRIMARY KEY (tenant, id)
    );

    CREATE TABLE Emails (
        tenant {{NVARCHAR}}(255) NOT NULL,
        userId VARCHAR(36) NOT NULL,
        value {{NTEXT}} NOT NULL,
        type {{NTEXT}} NULL,
        FOREIGN KEY (tenant, userId) REFERENCES Users(tenant, id) ON DELETE CASCADE
    );

    CREATE INDEX EmailsIdx ON Emails (tenant, userId);

    CREATE TABLE Enrolments (
        tenant {{NVARCHAR}}(255) NOT NULL,
        userId VARCHAR(36) NOT NULL,
        value VARCHAR(36) NOT NULL,
        schoolYear TINYINT NULL,
        FOREIGN KEY (tenant, userId) REFERENCES Users(tenant, id) ON DELETE CASCADE
    );

    CREATE INDEX EnrolmentsIdx ON Enrolments (tenant, userId);

    CREATE TABLE StudentGroups (
        tenant {{NVARCHAR}}(255) NOT NULL,
        id VARCHAR(36) NOT NULL,
        displayName {{NTEXT}} NOT NULL,
        owner VARCHAR(36) NOT NULL,
        studentGroupType {{NTEXT}} NULL,
        schoolType {{NTEXT}} NULL,
        PRIMARY KEY (tenant, id)
    );

    CREATE TABLE StudentMemberships (
        tenant {{NVARCHAR}}(255) NOT NULL,
        groupId VARCHAR(36) NOT NULL,
        userId VARCHAR(36) NOT NULL,
        FOREIGN KEY (tenant, groupId) REFERENCES StudentGroups(tenant, id) ON DELETE CASCADE
    );

    CREATE INDEX StudentMembershipsIdx ON StudentMemberships (tenant, groupId);

    CREATE TABLE Organisations (
        tenant {{NVARCHAR}}(255) NOT NULL,
        id VARCHAR(36) NOT NULL,
        displayName {{NTEXT}} NOT NULL,
        PRIMARY KEY (tenant, id)
    );

    CREATE TABLE SchoolUnitGroups (
        tenant {{NVARCHAR}}(255) NOT NULL,
        id VARCHAR(36) NOT NULL,
        displayName {{NTEXT}} NOT NULL,
        PRIMARY KEY (tenant, id)
    );

    CREATE TABLE SchoolUnits (
        tenant {{NVARCHAR}}(255) NOT NULL,
        id VARCHAR(36) NOT NULL,
        displayName {{NTEXT}} NOT NULL,
        schoolUnitCode {{NTEXT}} NOT NULL,
        organisation VARCHAR(36) NULL,
        schoolUnitGroup VARCHAR(36) NULL,
        municipalityCode {{NTEXT}} NULL,
        PRIMARY KEY (tenant, id)
    );

    CREATE TABLE SchoolTypes (
        tenant {{NVARCHAR}}(255) NOT NULL,
        schoolUnitId VARCHAR(36) NOT NULL,
        schoolType {{NTEXT}} NOT NULL,
        FOREIGN KEY (tenant, schoolUnitId) REFERENCES SchoolUnits(tenant, id) ON DELETE CASCADE
    );

    CREATE INDEX SchoolTypesIdx ON SchoolTypes (tenant, schoolUnitId);

    CREATE TABLE Employments (
        tenant {{NVARCHAR}}(255) NOT NULL,
        id VARCHAR(36) NOT NULL,
        employedAt VARCHAR(36) NOT NULL,
        userId VARCHAR(36) NOT NULL,
        employmentRole {{NTEXT}} NOT NULL,
        signature {{NTEXT}} NULL,
        PRIMARY KEY (tenant, id)
    );

    CREATE TABLE Activities (
        tenant {{NVARCHAR}}(255) NOT NULL,
        id VARCHAR(36) NOT NULL,
        displayName {{NTEXT}} NOT NULL,
        owner VARCHAR(36) NOT NULL,
        PRIMARY KEY (tenant, id)
    );

    CREATE TABLE ActivityTeachers (
        tenant {{NVARCHAR}}(255) NOT NULL,
        activityId VARCHAR(36) NOT NULL,
        employmentId VARCHAR(36) NOT NULL,
        FOREIGN KEY (tenant, activityId) REFERENCES Activities(tenant, id) ON DELETE CASCADE
    );

    CREATE INDEX ActivityTeachersIdx ON ActivityTeachers (tenant, activityId);

    CREATE TABLE ActivityGroups (
        tenant {{NVARCHAR}}(255) NOT NULL,
        activityId VARCHAR(36) NOT NULL,
        groupId VARCHAR(36) NOT NULL,
        FOREIGN KEY (tenant, activityId) REFERENCES Activities(tenant, id) ON DELETE CASCADE
    );

    CREATE INDEX ActivityGroupsIdx ON ActivityGroups (tenant, activityId);
    "#,
    // v2: adds support for external identifiers
    r#"
    CREATE TABLE ExternalIdentifiers (
        tenant {{NVARCHAR}}(255) NOT NULL,
        userId VARCHAR(36) NOT NULL,
        value {{NTEXT}} NOT NULL,
        context {{NTEXT}} NULL,
        globallyUnique TINYINT NOT NULL,
        FOREIGN KEY (tenant, userId) REFERENCES Users(tenant, id) ON DELETE CASCADE
    );

    CREATE INDEX ExternalIdentifiersIdx ON ExternalIdentifiers (tenant, userId);
    "#,
];

const DOWNGRADES: [&str; 2] = [
    // v1 - nothing, we never downgrade below 1
    "",
    // v2: removes support for external identifiers
    "DROP TABLE ExternalIdentifiers;",
];

/// The schema version this build of the code works against.
#[must_use]
pub fn current_schema_version() -> i64 {
    MIGRATIONS.len() as i64
}

/// Read the stored schema version; an unreadable meta table means an
/// uninitialized database.
async fn db_version(pool: &AnyPool) -> i64 {
    let row = sqlx::query("SELECT version FROM windermere_meta")
        .fetch_one(pool)
        .await;
    match row {
        Ok(row) => row.try_get::<i64, _>(0).or_else(|_| row.try_get::<i32, _>(0).map(i64::from)).unwrap_or(0),
        Err(_) => 0,
    }
}

/// Execute a multi-statement DDL script inside a transaction, statement by
/// statement (not every driver accepts multi-statement execs).
async fn run_script(
    tx: &mut Transaction<'_, Any>,
    dialect: Dialect,
    script: &str,
) -> Result<(), StorageError> {
    let expanded = dialect.expand_ddl(script);
    for statement in expanded.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(&mut **tx).await?;
    }
    Ok(())
}

async fn set_version(
    tx: &mut Transaction<'_, Any>,
    dialect: Dialect,
    version: i64,
) -> Result<(), StorageError> {
    sqlx::query(&dialect.rebind("UPDATE windermere_meta SET version = ?"))
        .bind(version)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Check connectivity and schema version, then apply any pending forward
/// migrations in a single transaction.
///
/// Refuses to operate on a database whose schema version is newer than this
/// build supports.
pub(crate) async fn init_schema(pool: &AnyPool, dialect: Dialect) -> Result<(), StorageError> {
    let version = db_version(pool).await;
    let supported = current_schema_version();
    if version > supported {
        return Err(StorageError::SchemaTooNew {
            found: version,
            supported,
        });
    }
    if version == supported {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for index in version..supported {
        info!(version = index + 1, "applying schema migration");
        run_script(&mut tx, dialect, MIGRATIONS[index as usize]).await?;
    }
    set_version(&mut tx, dialect, supported).await?;
    tx.commit().await?;
    Ok(())
}

/// Run the reverse migrations down to `target` and stamp the new version,
/// all in one transaction.
pub async fn downgrade_schema(url: &str, target: i64) -> Result<(), StorageError> {
    let (pool, dialect) = pool::connect(url).await?;
    let version = db_version(&pool).await;
    if version > current_schema_version() {
        return Err(StorageError::SchemaTooNew {
            found: version,
            supported: current_schema_version(),
        });
    }
    if version <= target {
        return Err(StorageError::InvalidDowngrade {
            current: version,
            target,
        });
    }

    let mut tx = pool.begin().await?;
    let mut index = version;
    while index > target {
        info!(version = index, "reverting schema migration");
        run_script(&mut tx, dialect, DOWNGRADES[(index - 1) as usize]).await?;
        index -= 1;
    }
    set_version(&mut tx, dialect, target).await?;
    tx.commit().await?;
    Ok(())
}
