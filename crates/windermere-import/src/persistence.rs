//! Persistent storage for import configurations and history.
//!
//! One row per tenant in a `configs` table, with the configuration and the
//! history as two JSON documents. The history is small (well under a
//! kilobyte) and written at a low rate, so every setter simply
//! read-modifies-writes the whole document under the tenant's row.

use chrono::{DateTime, Utc};
use sqlx::AnyPool;
use sqlx::{FromRow, Row};

use async_trait::async_trait;
use windermere_db::Dialect;

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::history::{ImportHistory, TenantImportHistory};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS configs (
        tenant {{NVARCHAR}}(255) NOT NULL,
        config {{NTEXT}} NOT NULL,
        history {{NTEXT}} NOT NULL,
        PRIMARY KEY (tenant)
    );
"#;

/// Storage for import configurations, one row per tenant.
#[derive(Clone)]
pub struct ImportPersistence {
    pool: AnyPool,
    dialect: Dialect,
}

#[derive(FromRow)]
struct ConfigRow {
    config: String,
    history: String,
}

impl ImportPersistence {
    /// Open (and if needed create) the import database.
    pub async fn open(url: &str) -> Result<Self, ImportError> {
        let (pool, dialect) = windermere_db::connect(url)
            .await
            .map_err(ImportError::Storage)?;
        let persistence = Self { pool, dialect };
        persistence.init_schema().await?;
        Ok(persistence)
    }

    async fn init_schema(&self) -> Result<(), ImportError> {
        let ddl = self.dialect.expand_ddl(SCHEMA);
        for statement in ddl.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn row(&self, tenant: &str) -> Result<Option<ConfigRow>, ImportError> {
        let sql = self
            .dialect
            .rebind("SELECT config, history FROM configs WHERE tenant = ?");
        let row = sqlx::query_as::<_, ConfigRow>(&sql)
            .bind(tenant)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Create or update an import. An existing import keeps its history.
    pub async fn add_import(&self, config: &ImportConfig) -> Result<(), ImportError> {
        let config_json = serde_json::to_string(config)?;
        if self.row(&config.tenant).await?.is_some() {
            let sql = self
                .dialect
                .rebind("UPDATE configs SET config = ? WHERE tenant = ?");
            sqlx::query(&sql)
                .bind(&config_json)
                .bind(&config.tenant)
                .execute(&self.pool)
                .await?;
        } else {
            let history_json = serde_json::to_string(&TenantImportHistory::default())?;
            let sql = self
                .dialect
                .rebind("INSERT INTO configs (tenant, config, history) VALUES (?, ?, ?)");
            sqlx::query(&sql)
                .bind(&config.tenant)
                .bind(&config_json)
                .bind(&history_json)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_import(&self, tenant: &str) -> Result<(), ImportError> {
        let sql = self.dialect.rebind("DELETE FROM configs WHERE tenant = ?");
        sqlx::query(&sql).bind(tenant).execute(&self.pool).await?;
        Ok(())
    }

    /// The tenants with a configured import.
    pub async fn get_all_imports(&self) -> Result<Vec<String>, ImportError> {
        let rows = sqlx::query("SELECT tenant FROM configs")
            .fetch_all(&self.pool)
            .await?;
        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            tenants.push(row.try_get::<String, _>(0)?);
        }
        Ok(tenants)
    }

    /// The configuration for a tenant; `None` when no import is configured.
    pub async fn get_import_config(
        &self,
        tenant: &str,
    ) -> Result<Option<ImportConfig>, ImportError> {
        let Some(row) = self.row(tenant).await? else {
            return Ok(None);
        };
        let config = serde_json::from_str(&row.config)
            .map_err(|e| ImportError::History(format!("failed to parse import config: {e}")))?;
        Ok(Some(config))
    }

    /// A history handle bound to one tenant's row.
    #[must_use]
    pub fn history(&self, tenant: &str) -> SqlImportHistory {
        SqlImportHistory {
            pool: self.pool.clone(),
            dialect: self.dialect,
            tenant: tenant.to_string(),
        }
    }
}

/// [`ImportHistory`] stored in the tenant's `configs` row.
pub struct SqlImportHistory {
    pool: AnyPool,
    dialect: Dialect,
    tenant: String,
}

impl SqlImportHistory {
    async fn get_history(&self) -> Result<TenantImportHistory, ImportError> {
        let sql = self
            .dialect
            .rebind("SELECT history FROM configs WHERE tenant = ?");
        let row = sqlx::query(&sql)
            .bind(&self.tenant)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(ImportError::History(format!(
                "no configured import for {}",
                self.tenant
            )));
        };
        let blob: String = row.try_get(0)?;
        serde_json::from_str(&blob)
            .map_err(|e| ImportError::History(format!("failed to parse import history: {e}")))
    }

    async fn set_history(&self, history: &TenantImportHistory) -> Result<(), ImportError> {
        let blob = serde_json::to_string(history)?;
        let sql = self
            .dialect
            .rebind("UPDATE configs SET history = ? WHERE tenant = ?");
        sqlx::query(&sql)
            .bind(&blob)
            .bind(&self.tenant)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update<F>(&self, mutate: F) -> Result<(), ImportError>
    where
        F: FnOnce(&mut TenantImportHistory) + Send,
    {
        let mut history = self.get_history().await?;
        mutate(&mut history);
        self.set_history(&history).await
    }
}

#[async_trait]
impl ImportHistory for SqlImportHistory {
    async fn last_started_full(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.get_history().await?.last_started_full)
    }

    async fn last_completed_full(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.get_history().await?.last_completed_full)
    }

    async fn last_started_incremental(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.get_history().await?.last_started_incremental)
    }

    async fn last_completed_incremental(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.get_history().await?.last_completed_incremental)
    }

    async fn set_last_started_full(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.update(|h| h.last_started_full = Some(at)).await
    }

    async fn set_last_completed_full(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.update(|h| h.last_completed_full = Some(at)).await
    }

    async fn set_last_started_incremental(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.update(|h| h.last_started_incremental = Some(at)).await
    }

    async fn set_last_completed_incremental(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.update(|h| h.last_completed_incremental = Some(at))
            .await
    }

    async fn record_most_recent(
        &self,
        created: &[DateTime<Utc>],
        modified: &[DateTime<Utc>],
        query_type: &str,
    ) -> Result<(), ImportError> {
        self.update(|h| h.record_most_recent(created, modified, query_type))
            .await
    }

    async fn most_recently_created(
        &self,
        query_type: &str,
    ) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self
            .get_history()
            .await?
            .most_recently_created
            .get(query_type)
            .copied())
    }

    async fn most_recently_modified(
        &self,
        query_type: &str,
    ) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self
            .get_history()
            .await?
            .most_recently_modified
            .get(query_type)
            .copied())
    }

    async fn last_deleted_entities_call(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.get_history().await?.last_deleted_entities_call)
    }

    async fn set_last_deleted_entities_call(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.update(|h| h.last_deleted_entities_call = Some(at))
            .await
    }
}
