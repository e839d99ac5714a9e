//! Tenant identification.
//!
//! The SCIM handlers only need to know which tenant the authenticated
//! client represents; how that was established (federated TLS, API keys)
//! lives outside this crate. [`Tenant`] is read from request extensions,
//! where an auth layer put it. [`api_key_auth`] is the simple header-based
//! layer the service installs; with no keys configured everything maps to
//! the empty tenant.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

/// The authenticated tenant of a request; empty when unauthenticated.
#[derive(Debug, Clone, Default)]
pub struct Tenant(pub String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Tenant>().cloned().unwrap_or_default())
    }
}

/// API key → tenant mapping used by [`api_key_auth`].
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// The header carrying the key.
    pub header: String,
    /// Key value → tenant name.
    pub tenants: Arc<HashMap<String, String>>,
}

/// Middleware resolving the request's tenant from an API key header.
///
/// With an empty key map every request passes as the empty tenant (the
/// unauthenticated legacy mode); otherwise an unknown or absent key is
/// a 401.
pub async fn api_key_auth(
    State(keys): State<ApiKeys>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if keys.tenants.is_empty() {
        request.extensions_mut().insert(Tenant::default());
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(&keys.header)
        .and_then(|value| value.to_str().ok());
    let Some(tenant) = presented.and_then(|key| keys.tenants.get(key)) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(Tenant(tenant.clone()));
    Ok(next.run(request).await)
}
