//! The generic SCIM resource handlers.
//!
//! One set of handlers serves all seven endpoints; the resource type is a
//! path segment validated against the configured endpoint set, and the
//! storage backend does the per-type dispatch.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use windermere_db::SqlBackend;
use windermere_model::ResourceType;

use crate::auth::Tenant;
use crate::error::ApiError;

pub const SCIM_MEDIA_TYPE: &str = "application/scim+json";
pub const SCIM_DEPRECATED_MEDIA_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct ScimState {
    pub backend: Arc<SqlBackend>,
}

/// 404 unless the path segment names a provisioned endpoint.
fn known_resource_type(resource_type: &str) -> Result<(), ApiError> {
    resource_type
        .parse::<ResourceType>()
        .map(drop)
        .map_err(|()| ApiError::not_found("no such resource type"))
}

/// SCIM requires its own media type on writes; the plain JSON one is
/// accepted for older clients.
fn check_media_type(headers: &HeaderMap) -> Result<(), Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    if essence == SCIM_MEDIA_TYPE || essence == SCIM_DEPRECATED_MEDIA_TYPE {
        Ok(())
    } else {
        Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Bad media type: got \"{content_type}\" (SCIM uses {SCIM_MEDIA_TYPE})"),
        )
            .into_response())
    }
}

fn resource_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, SCIM_MEDIA_TYPE)], body).into_response()
}

/// POST /{type}
pub async fn create_resource(
    State(state): State<ScimState>,
    Path(resource_type): Path<String>,
    tenant: Tenant,
    headers: HeaderMap,
    body: String,
) -> Result<Response, Response> {
    check_media_type(&headers)?;
    known_resource_type(&resource_type).map_err(IntoResponse::into_response)?;
    let stored = state
        .backend
        .create(&tenant.0, &resource_type, &body)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;
    Ok(resource_response(StatusCode::CREATED, stored))
}

/// PUT /{type}/{id}
pub async fn update_resource(
    State(state): State<ScimState>,
    Path((resource_type, id)): Path<(String, String)>,
    tenant: Tenant,
    headers: HeaderMap,
    body: String,
) -> Result<Response, Response> {
    check_media_type(&headers)?;
    known_resource_type(&resource_type).map_err(IntoResponse::into_response)?;
    let stored = state
        .backend
        .update(&tenant.0, &resource_type, &id, &body)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;
    Ok(resource_response(StatusCode::OK, stored))
}

#[derive(Deserialize)]
struct IdProbe {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "externalId")]
    external_id: String,
}

/// PUT /{type}, the compatibility workaround.
///
/// Some clients PUT to the resource-type endpoint instead of the
/// resource's URI. The id is recovered from the body (`id`, falling back
/// to `externalId`) and the request then behaves exactly like a PUT to
/// `/{type}/{id}`.
pub async fn update_resource_compat(
    State(state): State<ScimState>,
    Path(resource_type): Path<String>,
    tenant: Tenant,
    headers: HeaderMap,
    body: String,
) -> Result<Response, Response> {
    check_media_type(&headers)?;
    known_resource_type(&resource_type).map_err(IntoResponse::into_response)?;

    let probe: IdProbe = serde_json::from_str(&body).map_err(|_| {
        ApiError::bad_request("Failed to parse body (also invalid PUT to resource type)")
            .into_response()
    })?;
    let id = if !probe.id.is_empty() {
        probe.id
    } else if !probe.external_id.is_empty() {
        probe.external_id
    } else {
        return Err(ApiError::bad_request(
            "Invalid PUT to resource type didn't include id or externalId in body",
        )
        .into_response());
    };

    let stored = state
        .backend
        .update(&tenant.0, &resource_type, &id, &body)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;
    Ok(resource_response(StatusCode::OK, stored))
}

/// DELETE /{type}/{id}
pub async fn delete_resource(
    State(state): State<ScimState>,
    Path((resource_type, id)): Path<(String, String)>,
    tenant: Tenant,
) -> Result<StatusCode, ApiError> {
    known_resource_type(&resource_type)?;
    state
        .backend
        .delete(&tenant.0, &resource_type, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /{type}/{id}
pub async fn get_resource(
    State(state): State<ScimState>,
    Path((resource_type, id)): Path<(String, String)>,
    tenant: Tenant,
) -> Result<Response, ApiError> {
    known_resource_type(&resource_type)?;
    let body = state
        .backend
        .get_resource(&tenant.0, &resource_type, &id)
        .await?;
    Ok(resource_response(StatusCode::OK, body))
}

/// GET /{type}: every resource of the type, as a SCIM ListResponse.
///
/// Exists so clients can rebuild their caches; no paging, no filtering,
/// no sorting.
pub async fn list_resources(
    State(state): State<ScimState>,
    Path(resource_type): Path<String>,
    tenant: Tenant,
) -> Result<Response, ApiError> {
    known_resource_type(&resource_type)?;
    let resources = state
        .backend
        .get_resources(&tenant.0, &resource_type)
        .await?;

    let mut listed = Vec::with_capacity(resources.len());
    for (id, resource) in resources {
        let mut parsed: Map<String, Value> = serde_json::from_str(&resource)
            .map_err(|e| ApiError::from(windermere_db::StorageError::Serialization(e)))?;
        parsed.insert("id".to_string(), Value::String(id));
        listed.push(Value::Object(parsed));
    }

    let response = serde_json::json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
        "totalResults": listed.len(),
        "Resources": listed,
    });
    Ok(resource_response(StatusCode::OK, response.to_string()))
}
