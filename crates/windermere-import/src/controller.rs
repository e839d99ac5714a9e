//! Binding of the import sub-system's components.
//!
//! The controller connects the persistence layer, the manager and the
//! storage backend so the configuration surface and `main` don't have to
//! know about each component individually. It is passive: no task of its
//! own, nothing to shut down.

use std::sync::Arc;
use std::time::Duration;

use crate::client::Ss12000Client;
use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::manager::ImportManager;
use crate::persistence::ImportPersistence;
use crate::reconcile::ReconcileBackend;
use crate::runner::RunnerConfig;

pub struct ImportController {
    manager: Arc<ImportManager>,
    persistence: Arc<ImportPersistence>,
    backend: ReconcileBackend,
}

impl ImportController {
    #[must_use]
    pub fn new(
        persistence: Arc<ImportPersistence>,
        manager: Arc<ImportManager>,
        backend: ReconcileBackend,
    ) -> Self {
        Self {
            manager,
            persistence,
            backend,
        }
    }

    /// Build a live runner configuration from a stored import config.
    fn runner_config(&self, config: &ImportConfig) -> Result<RunnerConfig, ImportError> {
        let client = Ss12000Client::new(&config.api)?;
        Ok(RunnerConfig {
            tenant: config.tenant.clone(),
            backend: self.backend.clone(),
            client: Arc::new(client),
            history: Arc::new(self.persistence.history(&config.tenant)),
            full_import_frequency: Duration::from_secs(config.full_import_frequency),
            full_import_retry_wait: Duration::from_secs(config.full_import_retry_wait),
            incremental_import_frequency: Duration::from_secs(config.incremental_import_frequency),
            incremental_import_retry_wait: Duration::from_secs(
                config.incremental_import_retry_wait,
            ),
        })
    }

    /// Start runners for every configured import; called once at boot.
    pub async fn start_all(&self) {
        let tenants = match self.persistence.get_all_imports().await {
            Ok(tenants) => tenants,
            Err(err) => {
                tracing::error!(%err, "failed to get import configurations from persistence");
                return;
            }
        };
        for tenant in tenants {
            let config = match self.persistence.get_import_config(&tenant).await {
                Ok(Some(config)) => config,
                Ok(None) => {
                    tracing::error!(tenant, "failed to find import configuration");
                    continue;
                }
                Err(err) => {
                    tracing::error!(tenant, %err, "failed to read import configuration");
                    continue;
                }
            };
            match self.runner_config(&config) {
                Ok(runner_config) => self.manager.add_runner(runner_config).await,
                Err(err) => tracing::error!(tenant, %err, "failed to start import"),
            }
        }
    }

    /// Add an import (or replace an existing one) and start its runner.
    pub async fn add_import(&self, config: ImportConfig) -> Result<(), ImportError> {
        self.persistence.add_import(&config).await?;
        let runner_config = self
            .runner_config(&config)
            .map_err(|e| ImportError::Config(format!("import was created but couldn't start: {e}")))?;
        self.manager.add_runner(runner_config).await;
        Ok(())
    }

    /// Delete an import. Blocks until the runner has stopped, then removes
    /// the persisted configuration and history.
    pub async fn delete_import(&self, tenant: &str) -> Result<(), ImportError> {
        self.manager.delete_runner(tenant).await;
        self.persistence.delete_import(tenant).await
    }

    pub async fn get_all_imports(&self) -> Result<Vec<String>, ImportError> {
        self.persistence.get_all_imports().await
    }

    pub async fn get_import_config(
        &self,
        tenant: &str,
    ) -> Result<Option<ImportConfig>, ImportError> {
        self.persistence.get_import_config(tenant).await
    }
}
