//! Scheduled import from SS12000 v2 sources.
//!
//! For tenants that push from a newer SS12000 v2 source, a per-tenant
//! worker alternates between full and incremental imports against the
//! remote's paginated API, transforms the objects into their SS12000:2018
//! shape, and reconciles them into the SCIM storage through its bulk
//! operation. Watermarks live in a persisted per-tenant history.

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod full;
pub mod history;
pub mod incremental;
pub mod manager;
pub mod model;
pub mod persistence;
pub mod reconcile;
pub mod runner;
pub mod to_v1;

pub use client::{OrganisationType, Page, PageReader, QueryParams, Ss12000Client};
pub use config::{ApiConfiguration, AuthenticationType, ImportConfig};
pub use controller::ImportController;
pub use error::ImportError;
pub use full::full_import;
pub use history::{ImportHistory, InMemoryImportHistory, TenantImportHistory, QUERY_TYPES};
pub use incremental::incremental_import;
pub use manager::ImportManager;
pub use persistence::{ImportPersistence, SqlImportHistory};
pub use reconcile::ReconcileBackend;
pub use runner::{ImportRunner, RunnerConfig};
