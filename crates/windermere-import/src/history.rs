//! Per-tenant import history.
//!
//! The import needs its history both to decide when the next full or
//! incremental run is due and, for incremental runs, to know the most
//! recent object timestamps per query type. The [`ImportHistory`] trait
//! hides where that history lives; a "never set" value is `None` and not
//! an error.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// The query types watermarks are tracked for.
pub const QUERY_TYPES: [&str; 6] = [
    "PrincipalOrganisations",
    "SchoolUnitOrganisations",
    "Persons",
    "Groups",
    "Duties",
    "Activities",
];

/// Everything stored about one tenant's import history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantImportHistory {
    pub last_started_full: Option<DateTime<Utc>>,
    pub last_completed_full: Option<DateTime<Utc>>,
    pub last_started_incremental: Option<DateTime<Utc>>,
    pub last_completed_incremental: Option<DateTime<Utc>>,
    pub most_recently_created: HashMap<String, DateTime<Utc>>,
    pub most_recently_modified: HashMap<String, DateTime<Utc>>,
    pub last_deleted_entities_call: Option<DateTime<Utc>>,
}

impl TenantImportHistory {
    /// Fold new created/modified stamps into the per-query-type maxima.
    pub fn record_most_recent(
        &mut self,
        created: &[DateTime<Utc>],
        modified: &[DateTime<Utc>],
        query_type: &str,
    ) {
        if let Some(&max) = created.iter().max() {
            let entry = self
                .most_recently_created
                .entry(query_type.to_string())
                .or_insert(max);
            if max > *entry {
                *entry = max;
            }
        }
        if let Some(&max) = modified.iter().max() {
            let entry = self
                .most_recently_modified
                .entry(query_type.to_string())
                .or_insert(max);
            if max > *entry {
                *entry = max;
            }
        }
    }
}

/// Access to one tenant's import history, wherever it is stored.
#[async_trait]
pub trait ImportHistory: Send + Sync {
    async fn last_started_full(&self) -> Result<Option<DateTime<Utc>>, ImportError>;
    async fn last_completed_full(&self) -> Result<Option<DateTime<Utc>>, ImportError>;
    async fn last_started_incremental(&self) -> Result<Option<DateTime<Utc>>, ImportError>;
    async fn last_completed_incremental(&self) -> Result<Option<DateTime<Utc>>, ImportError>;

    async fn set_last_started_full(&self, at: DateTime<Utc>) -> Result<(), ImportError>;
    async fn set_last_completed_full(&self, at: DateTime<Utc>) -> Result<(), ImportError>;
    async fn set_last_started_incremental(&self, at: DateTime<Utc>) -> Result<(), ImportError>;
    async fn set_last_completed_incremental(&self, at: DateTime<Utc>) -> Result<(), ImportError>;

    /// Advance the per-query-type maxima with the given stamps.
    async fn record_most_recent(
        &self,
        created: &[DateTime<Utc>],
        modified: &[DateTime<Utc>],
        query_type: &str,
    ) -> Result<(), ImportError>;
    async fn most_recently_created(
        &self,
        query_type: &str,
    ) -> Result<Option<DateTime<Utc>>, ImportError>;
    async fn most_recently_modified(
        &self,
        query_type: &str,
    ) -> Result<Option<DateTime<Utc>>, ImportError>;

    async fn last_deleted_entities_call(&self) -> Result<Option<DateTime<Utc>>, ImportError>;
    async fn set_last_deleted_entities_call(&self, at: DateTime<Utc>) -> Result<(), ImportError>;
}

/// History kept only in memory; used by tests and the legacy boot path.
#[derive(Debug, Default)]
pub struct InMemoryImportHistory {
    inner: Mutex<TenantImportHistory>,
}

impl InMemoryImportHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImportHistory for InMemoryImportHistory {
    async fn last_started_full(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.inner.lock().unwrap().last_started_full)
    }

    async fn last_completed_full(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.inner.lock().unwrap().last_completed_full)
    }

    async fn last_started_incremental(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.inner.lock().unwrap().last_started_incremental)
    }

    async fn last_completed_incremental(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.inner.lock().unwrap().last_completed_incremental)
    }

    async fn set_last_started_full(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.inner.lock().unwrap().last_started_full = Some(at);
        Ok(())
    }

    async fn set_last_completed_full(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.inner.lock().unwrap().last_completed_full = Some(at);
        Ok(())
    }

    async fn set_last_started_incremental(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.inner.lock().unwrap().last_started_incremental = Some(at);
        Ok(())
    }

    async fn set_last_completed_incremental(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.inner.lock().unwrap().last_completed_incremental = Some(at);
        Ok(())
    }

    async fn record_most_recent(
        &self,
        created: &[DateTime<Utc>],
        modified: &[DateTime<Utc>],
        query_type: &str,
    ) -> Result<(), ImportError> {
        self.inner
            .lock()
            .unwrap()
            .record_most_recent(created, modified, query_type);
        Ok(())
    }

    async fn most_recently_created(
        &self,
        query_type: &str,
    ) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .most_recently_created
            .get(query_type)
            .copied())
    }

    async fn most_recently_modified(
        &self,
        query_type: &str,
    ) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .most_recently_modified
            .get(query_type)
            .copied())
    }

    async fn last_deleted_entities_call(&self) -> Result<Option<DateTime<Utc>>, ImportError> {
        Ok(self.inner.lock().unwrap().last_deleted_entities_call)
    }

    async fn set_last_deleted_entities_call(&self, at: DateTime<Utc>) -> Result<(), ImportError> {
        self.inner.lock().unwrap().last_deleted_entities_call = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn never_set_reads_as_none() {
        let history = InMemoryImportHistory::new();
        assert!(history.last_started_full().await.unwrap().is_none());
        assert!(history
            .most_recently_created("Persons")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn record_most_recent_keeps_the_maximum() {
        let history = InMemoryImportHistory::new();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        history
            .record_most_recent(&[t2, t1], &[t1], "Persons")
            .await
            .unwrap();
        assert_eq!(
            history.most_recently_created("Persons").await.unwrap(),
            Some(t2)
        );

        // An older batch never moves the watermark backwards.
        history
            .record_most_recent(&[t1], &[t3], "Persons")
            .await
            .unwrap();
        assert_eq!(
            history.most_recently_created("Persons").await.unwrap(),
            Some(t2)
        );
        assert_eq!(
            history.most_recently_modified("Persons").await.unwrap(),
            Some(t3)
        );

        // Query types don't bleed into each other.
        assert!(history
            .most_recently_created("Groups")
            .await
            .unwrap()
            .is_none());
    }
}
