//! Admin endpoints for configuring SS12000 v2 imports.
//!
//! A small JSON surface over the import controller: list imports, read,
//! create/replace and delete one per tenant. This is meant to sit behind
//! the operator's own access control, not the federated SCIM auth.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use windermere_import::{ImportConfig, ImportController};

pub fn import_admin_router(controller: Arc<ImportController>) -> Router {
    Router::new()
        .route("/imports", get(list_imports))
        .route(
            "/imports/:tenant",
            get(get_import).put(put_import).delete(delete_import),
        )
        .with_state(controller)
}

async fn list_imports(State(controller): State<Arc<ImportController>>) -> Response {
    match controller.get_all_imports().await {
        Ok(tenants) => Json(tenants).into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to list imports");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_import(
    State(controller): State<Arc<ImportController>>,
    Path(tenant): Path<String>,
) -> Response {
    match controller.get_import_config(&tenant).await {
        Ok(Some(config)) => Json(config).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::error!(tenant, %err, "failed to read import configuration");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn put_import(
    State(controller): State<Arc<ImportController>>,
    Path(tenant): Path<String>,
    Json(mut config): Json<ImportConfig>,
) -> Response {
    // The path names the tenant; the body doesn't get to disagree.
    config.tenant = tenant;
    match controller.add_import(config).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to add import");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

async fn delete_import(
    State(controller): State<Arc<ImportController>>,
    Path(tenant): Path<String>,
) -> Response {
    match controller.delete_import(&tenant).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            tracing::error!(tenant, %err, "failed to delete import");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
