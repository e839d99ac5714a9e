//! SCIM router configuration.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use windermere_db::SqlBackend;

use crate::handlers::{self, ScimState};

/// Create the SCIM resource router.
///
/// Routes for each provisioned endpoint `/{type}` and `/{type}/{id}`:
/// - `POST /{type}`: create, 201
/// - `PUT /{type}/{id}`: replace, 200
/// - `PUT /{type}`: compatibility replace with the id taken from the body
/// - `DELETE /{type}/{id}`: 204
/// - `GET /{type}`: ListResponse of everything
/// - `GET /{type}/{id}`: one resource
pub fn scim_router(backend: Arc<SqlBackend>) -> Router {
    let state = ScimState { backend };
    Router::new()
        .route(
            "/:resource_type",
            post(handlers::create_resource)
                .put(handlers::update_resource_compat)
                .get(handlers::list_resources),
        )
        .route(
            "/:resource_type/:id",
            get(handlers::get_resource)
                .put(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        .with_state(state)
}
