//! Reconciliation of imported lists into the SCIM storage.
//!
//! [`ReconcileBackend::replace`] turns a desired list of entities into
//! backend state through the bulk operation: creates for new ids, updates
//! for existing ones, and, when `delete_others` is set, deletes for
//! everything the backend had that the list no longer contains.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;
use windermere_db::{BulkOperation, SqlBackend};
use windermere_model::{Entity, ResourceType};

use crate::error::ImportError;

/// The storage seam the import procedures write through.
#[derive(Clone)]
pub struct ReconcileBackend {
    backend: Arc<SqlBackend>,
}

impl ReconcileBackend {
    #[must_use]
    pub fn new(backend: Arc<SqlBackend>) -> Self {
        Self { backend }
    }

    /// Create or update every entity in `objects`; with `delete_others`
    /// also delete any pre-existing entity of the type not in the list.
    ///
    /// Per-operation failures (one bad record) are logged and skipped;
    /// only infrastructure failures abort.
    pub async fn replace(
        &self,
        token: &CancellationToken,
        tenant: &str,
        resource_type: ResourceType,
        objects: &[Entity],
        delete_others: bool,
    ) -> Result<(), ImportError> {
        let existing = self
            .backend
            .get_resources(tenant, resource_type.as_str())
            .await?;

        let mut new_ids: HashSet<&str> = HashSet::with_capacity(objects.len());
        let mut operations = Vec::with_capacity(objects.len());
        for object in objects {
            let id = object.id();
            new_ids.insert(id);
            let resource = serde_json::to_string(object)?;
            if existing.contains_key(id) {
                operations.push(BulkOperation::Update {
                    resource_type: resource_type.as_str().to_string(),
                    resource_id: id.to_string(),
                    resource,
                });
            } else {
                operations.push(BulkOperation::Create {
                    resource_type: resource_type.as_str().to_string(),
                    resource,
                });
            }
        }

        if delete_others {
            for id in existing.keys() {
                if !new_ids.contains(id.as_str()) {
                    operations.push(BulkOperation::Delete {
                        resource_type: resource_type.as_str().to_string(),
                        resource_id: id.clone(),
                    });
                }
            }
        }

        let results = self.backend.bulk(token, tenant, &operations).await?;
        for result in results {
            if let Some(error) = result.error {
                warn!(
                    tenant,
                    resource_type = resource_type.as_str(),
                    id = result.operation.resource_id().unwrap_or_default(),
                    %error,
                    "bulk import operation failed"
                );
            }
        }
        Ok(())
    }

    /// Delete the given ids from each of the listed types, skipping ids a
    /// type doesn't hold.
    ///
    /// The v2 Organisation type covers both SS12000:2018 school units and
    /// organisations, which is why a deletion may need to try several
    /// types.
    pub async fn delete_ids(
        &self,
        token: &CancellationToken,
        tenant: &str,
        resource_types: &[ResourceType],
        ids: &[Uuid],
    ) -> Result<(), ImportError> {
        let mut operations = Vec::new();
        for resource_type in resource_types {
            let existing = self
                .backend
                .get_resources(tenant, resource_type.as_str())
                .await?;
            for id in ids {
                let id = id.to_string();
                if existing.contains_key(&id) {
                    operations.push(BulkOperation::Delete {
                        resource_type: resource_type.as_str().to_string(),
                        resource_id: id,
                    });
                }
            }
        }

        let results = self.backend.bulk(token, tenant, &operations).await?;
        for result in results {
            if let Some(error) = result.error {
                warn!(
                    tenant,
                    id = result.operation.resource_id().unwrap_or_default(),
                    %error,
                    "bulk delete operation failed"
                );
            }
        }
        Ok(())
    }
}
