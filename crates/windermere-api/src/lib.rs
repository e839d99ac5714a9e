//! SCIM HTTP ingress.
//!
//! A thin dispatcher between SCIM clients and the storage backend: media
//! type checks, URL shapes, the legacy PUT-to-collection workaround, and
//! the mapping from storage errors to SCIM status codes. Authentication is
//! not this crate's business beyond reading the tenant the auth middleware
//! established.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;

pub use auth::{api_key_auth, ApiKeys, Tenant};
pub use error::ApiError;
pub use router::scim_router;
