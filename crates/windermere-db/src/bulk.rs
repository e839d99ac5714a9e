//! Adaptive bulk execution.
//!
//! A bulk import can carry thousands of operations; one malformed or
//! conflicting record must not roll back the rest, but the common path must
//! stay O(batches) in database round-trips. Batches of up to
//! [`TRANSACTION_MAX_SIZE`] operations run in one transaction; on failure
//! the batch is split so the poison operation ends up in a transaction of
//! its own.

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::backend::{create_in_tx, delete_in_tx, update_in_tx, SqlBackend};
use crate::error::StorageError;

/// Largest number of operations applied in a single transaction.
pub const TRANSACTION_MAX_SIZE: usize = 50;

/// One create, update or delete inside a bulk call.
#[derive(Debug, Clone)]
pub enum BulkOperation {
    Create {
        resource_type: String,
        resource: String,
    },
    Update {
        resource_type: String,
        resource_id: String,
        resource: String,
    },
    Delete {
        resource_type: String,
        resource_id: String,
    },
}

impl BulkOperation {
    #[must_use]
    pub fn resource_type(&self) -> &str {
        match self {
            BulkOperation::Create { resource_type, .. }
            | BulkOperation::Update { resource_type, .. }
            | BulkOperation::Delete { resource_type, .. } => resource_type,
        }
    }

    /// The id targeted by the operation, when it carries one.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            BulkOperation::Create { .. } => None,
            BulkOperation::Update { resource_id, .. }
            | BulkOperation::Delete { resource_id, .. } => Some(resource_id),
        }
    }
}

/// The per-operation outcome of a bulk call, in input order.
#[derive(Debug)]
pub struct BulkOperationResult {
    pub operation: BulkOperation,
    pub error: Option<StorageError>,
}

impl BulkOperationResult {
    fn new(operation: &BulkOperation, error: Option<StorageError>) -> Self {
        Self {
            operation: operation.clone(),
            error,
        }
    }
}

impl SqlBackend {
    /// Apply an ordered list of operations for one tenant.
    ///
    /// Results come back in input order, one per operation. Failed
    /// operations are isolated into their own transactions so the rest of
    /// the batch still takes effect; only infrastructure failures (or a
    /// cancelled token) abort the call as a whole.
    pub async fn bulk(
        &self,
        token: &CancellationToken,
        tenant: &str,
        operations: &[BulkOperation],
    ) -> Result<Vec<BulkOperationResult>, StorageError> {
        self.bulk_slice(token, tenant, operations).await
    }

    fn bulk_slice<'a>(
        &'a self,
        token: &'a CancellationToken,
        tenant: &'a str,
        operations: &'a [BulkOperation],
    ) -> BoxFuture<'a, Result<Vec<BulkOperationResult>, StorageError>> {
        Box::pin(async move {
            if token.is_cancelled() {
                return Err(StorageError::Cancelled("context cancelled".to_string()));
            }

            match operations.len() {
                0 => return Ok(Vec::new()),
                1 => {
                    let op = &operations[0];
                    let error = self.apply_single(tenant, op).await;
                    return Ok(vec![BulkOperationResult::new(op, error)]);
                }
                n if n > TRANSACTION_MAX_SIZE => {
                    let mid = n / 2;
                    let mut results = self.bulk_slice(token, tenant, &operations[..mid]).await?;
                    results.extend(self.bulk_slice(token, tenant, &operations[mid..]).await?);
                    return Ok(results);
                }
                _ => {}
            }

            let mut tx = self.pool().begin().await?;
            let mut results = Vec::with_capacity(operations.len());

            for (i, op) in operations.iter().enumerate() {
                let outcome = self.apply_in_tx(&mut tx, tenant, op).await;
                let Err(err) = outcome else {
                    results.push(BulkOperationResult::new(op, None));
                    continue;
                };

                tx.rollback().await.ok();

                // A failure on the first operation of the transaction needs
                // no re-run: accept it and continue with the rest in a new
                // transaction.
                if i == 0 {
                    let mut results = vec![BulkOperationResult::new(op, Some(err))];
                    results.extend(self.bulk_slice(token, tenant, &operations[1..]).await?);
                    return Ok(results);
                }

                // Otherwise re-run the operations before the failure in one
                // transaction, the failing one on its own, and the rest
                // separately.
                let mut results = self.bulk_slice(token, tenant, &operations[..i]).await?;
                results.extend(self.bulk_slice(token, tenant, &operations[i..=i]).await?);
                results.extend(self.bulk_slice(token, tenant, &operations[i + 1..]).await?);
                return Ok(results);
            }

            if tx.commit().await.is_ok() {
                return Ok(results);
            }

            // Every operation succeeded individually but the commit failed.
            // Replay the whole batch one operation per transaction.
            let mut results = Vec::with_capacity(operations.len());
            for op in operations {
                let error = self.apply_single(tenant, op).await;
                results.push(BulkOperationResult::new(op, error));
            }
            Ok(results)
        })
    }

    /// Apply one operation in its own transaction, returning its error.
    async fn apply_single(&self, tenant: &str, op: &BulkOperation) -> Option<StorageError> {
        let result = match op {
            BulkOperation::Create {
                resource_type,
                resource,
            } => self.create(tenant, resource_type, resource).await.map(drop),
            BulkOperation::Update {
                resource_type,
                resource_id,
                resource,
            } => self
                .update(tenant, resource_type, resource_id, resource)
                .await
                .map(drop),
            BulkOperation::Delete {
                resource_type,
                resource_id,
            } => self.delete(tenant, resource_type, resource_id).await,
        };
        result.err()
    }

    /// Apply one operation inside an open transaction.
    ///
    /// Parse failures surface here just like constraint failures, so the
    /// splitting logic treats them uniformly.
    async fn apply_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Any>,
        tenant: &str,
        op: &BulkOperation,
    ) -> Result<(), StorageError> {
        let rt = op
            .resource_type()
            .parse()
            .map_err(|()| StorageError::UnknownResourceType(op.resource_type().to_string()))?;
        match op {
            BulkOperation::Create {
                resource_type,
                resource,
            } => {
                let entity = self.parse(resource_type, resource)?;
                create_in_tx(&mut *tx, self.dialect(), tenant, rt, &entity).await
            }
            BulkOperation::Update {
                resource_type,
                resource_id,
                resource,
            } => {
                let entity = self.parse(resource_type, resource)?;
                update_in_tx(&mut *tx, self.dialect(), tenant, rt, resource_id, &entity).await
            }
            BulkOperation::Delete { resource_id, .. } => {
                delete_in_tx(&mut *tx, self.dialect(), tenant, rt, resource_id).await
            }
        }
    }
}
