//! End-to-end tests for the SCIM endpoints over a SQLite backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::{Extension, Router};
use serde_json::{json, Value};
use tower::ServiceExt;
use windermere_api::{scim_router, Tenant};
use windermere_db::SqlBackend;
use windermere_model::parse_resource;

const USER_ID: &str = "75c666db-e60e-4687-bdd3-1af191fa6799";
const GROUP_ID: &str = "39074b36-e0ed-4443-a501-5148992014b9";

async fn open_backend() -> Arc<SqlBackend> {
    let db = std::env::temp_dir().join(format!("windermere-api-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", db.display());
    Arc::new(
        SqlBackend::open(&url, Arc::new(|rt, body| parse_resource(rt, body)))
            .await
            .expect("backend should open"),
    )
}

/// The router as an authenticated tenant sees it.
fn app_for(backend: &Arc<SqlBackend>, tenant: &str) -> Router {
    scim_router(Arc::clone(backend)).layer(Extension(Tenant(tenant.to_string())))
}

fn user_body(user_name: &str) -> String {
    json!({
        "externalId": USER_ID,
        "userName": user_name,
        "name": {"familyName": "Jensen", "givenName": "Barbara"},
        "displayName": "Babs"
    })
    .to_string()
}

fn scim_request(method: &str, uri: &str, body: Option<String>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/scim+json");
    match body {
        Some(body) => builder.body(Body::from(body)).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_read_update_delete_round_trip() {
    let backend = open_backend().await;
    let app = app_for(&backend, "tenant-a");

    // POST
    let response = app
        .clone()
        .oneshot(scim_request("POST", "/Users", Some(user_body("baje@x.se"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["userName"], "baje@x.se");

    // GET by id
    let response = app
        .clone()
        .oneshot(scim_request("GET", &format!("/Users/{USER_ID}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["externalId"], USER_ID);
    assert_eq!(fetched["userName"], "baje@x.se");

    // PUT
    let response = app
        .clone()
        .oneshot(scim_request(
            "PUT",
            &format!("/Users/{USER_ID}"),
            Some(user_body("baje12@x.se")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(scim_request("GET", &format!("/Users/{USER_ID}"), None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["userName"], "baje12@x.se");

    // DELETE
    let response = app
        .clone()
        .oneshot(scim_request("DELETE", &format!("/Users/{USER_ID}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(scim_request("GET", &format!("/Users/{USER_ID}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn posting_the_same_user_twice_conflicts() {
    let backend = open_backend().await;
    let app = app_for(&backend, "tenant-a");

    let response = app
        .clone()
        .oneshot(scim_request("POST", "/Users", Some(user_body("baje@x.se"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(scim_request("POST", "/Users", Some(user_body("baje@x.se"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let backend = open_backend().await;
    let app_a = app_for(&backend, "tenant-a");
    let app_b = app_for(&backend, "tenant-b");

    for app in [&app_a, &app_b] {
        let response = app
            .clone()
            .oneshot(scim_request("POST", "/Users", Some(user_body("baje@x.se"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app_a
        .oneshot(scim_request("DELETE", &format!("/Users/{USER_ID}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app_b
        .oneshot(scim_request("GET", &format!("/Users/{USER_ID}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn put_to_collection_uses_the_body_id() {
    let backend = open_backend().await;
    let app = app_for(&backend, "tenant-a");

    let group = |name: &str| {
        json!({
            "externalId": GROUP_ID,
            "displayName": name,
            "owner": {"value": "c8331abf-2b84-4dd6-a921-a8d4ff06ca4c"}
        })
        .to_string()
    };

    let response = app
        .clone()
        .oneshot(scim_request("POST", "/StudentGroups", Some(group("1A"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // No id in the URL; it comes from the body's externalId.
    let response = app
        .clone()
        .oneshot(scim_request("PUT", "/StudentGroups", Some(group("1B"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(scim_request(
            "GET",
            &format!("/StudentGroups/{GROUP_ID}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["displayName"], "1B");
}

#[tokio::test]
async fn put_to_collection_without_an_id_is_rejected() {
    let backend = open_backend().await;
    let app = app_for(&backend, "tenant-a");

    let response = app
        .oneshot(scim_request(
            "PUT",
            "/StudentGroups",
            Some(json!({"displayName": "1A"}).to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_wraps_resources_with_ids() {
    let backend = open_backend().await;
    let app = app_for(&backend, "tenant-a");

    let response = app
        .clone()
        .oneshot(scim_request("POST", "/Users", Some(user_body("baje@x.se"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(scim_request("GET", "/Users", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(response).await;
    assert_eq!(
        list["schemas"][0],
        "urn:ietf:params:scim:api:messages:2.0:ListResponse"
    );
    assert_eq!(list["totalResults"], 1);
    assert_eq!(list["Resources"][0]["id"], USER_ID);
    assert_eq!(list["Resources"][0]["userName"], "baje@x.se");
}

#[tokio::test]
async fn malformed_bodies_and_media_types_are_rejected() {
    let backend = open_backend().await;
    let app = app_for(&backend, "tenant-a");

    // Missing required attributes.
    let response = app
        .clone()
        .oneshot(scim_request(
            "POST",
            "/Users",
            Some(json!({"externalId": USER_ID}).to_string()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Wrong media type.
    let request = Request::builder()
        .method("POST")
        .uri("/Users")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(user_body("baje@x.se")))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // Unknown endpoint.
    let response = app
        .oneshot(scim_request("GET", "/Unicorns", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
