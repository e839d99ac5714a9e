//! Integration tests for the import procedures, driving a mock SS12000 v2
//! API into a SQLite-backed SCIM storage.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use windermere_db::SqlBackend;
use windermere_import::{
    full_import, incremental_import, ApiConfiguration, AuthenticationType, ImportHistory,
    InMemoryImportHistory, ReconcileBackend, Ss12000Client,
};
use windermere_model::parse_resource;

const UNIT_ID: &str = "c8331abf-2b84-4dd6-a921-a8d4ff06ca4c";
const ORG_ID: &str = "11111111-2222-3333-4444-555555555555";
const PERSON_ID: &str = "75c666db-e60e-4687-bdd3-1af191fa6799";
const GROUP_ID: &str = "39074b36-e0ed-4443-a501-5148992014b9";
const FOREIGN_GROUP_ID: &str = "49074b36-e0ed-4443-a501-5148992014b9";
const DUTY_ID: &str = "5cc1eb29-d9e2-4f90-bfea-53d7a1945021";
const PERSONLESS_DUTY_ID: &str = "6cc1eb29-d9e2-4f90-bfea-53d7a1945021";
const ACTIVITY_ID: &str = "c9749d05-b363-4a49-a364-053b30de3f91";

async fn open_backend() -> Arc<SqlBackend> {
    let db = std::env::temp_dir().join(format!("windermere-import-{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", db.display());
    Arc::new(
        SqlBackend::open(&url, Arc::new(|rt, body| parse_resource(rt, body)))
            .await
            .expect("backend should open"),
    )
}

fn client_for(server: &MockServer) -> Ss12000Client {
    Ss12000Client::new(&ApiConfiguration {
        url: server.uri(),
        authentication: AuthenticationType::ApiKey,
        client_id: String::new(),
        client_secret: "secret".to_string(),
        api_key_header: "X-API-Key".to_string(),
    })
    .expect("client should build")
}

fn page(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
}

async fn mount_full_import_mocks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/organisations"))
        .and(query_param("type", "Huvudman"))
        .respond_with(page(json!([
            {
                "id": ORG_ID,
                "displayName": "Kommunen",
                "meta": {"created": "2024-01-01T00:00:00Z", "modified": "2024-01-02T00:00:00Z"}
            }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/organisations"))
        .and(query_param("type", "Skolenhet"))
        .respond_with(page(json!([
            {
                "id": UNIT_ID,
                "displayName": "Skolan",
                "schoolUnitCode": "12345678",
                "schoolTypes": ["GR"],
                "meta": {"created": "2024-01-01T00:00:00Z", "modified": "2024-01-03T00:00:00Z"}
            }
        ])))
        .mount(server)
        .await;

    // Persons come in two pages to exercise the page token plumbing.
    Mock::given(method("GET"))
        .and(path("/persons"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(page(json!([
            {
                "id": "85c666db-e60e-4687-bdd3-1af191fa6799",
                "givenName": "Bo",
                "familyName": "Ek",
                "eduPersonPrincipalNames": ["boek@x.se"],
                "meta": {"created": "2024-02-01T00:00:00Z", "modified": "2024-02-01T00:00:00Z"}
            }
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/persons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": PERSON_ID,
                    "givenName": "Barbara",
                    "familyName": "Jensen",
                    "eduPersonPrincipalNames": ["baje@x.se", "baje2@y.se"],
                    "emails": [{"value": "baje@x.se", "type": "work"}],
                    "enrolments": [{"enroledAt": {"id": UNIT_ID}, "schoolYear": 3, "schoolType": "GR"}],
                    "meta": {"created": "2024-02-02T00:00:00Z", "modified": "2024-02-03T00:00:00Z"}
                },
                {
                    "id": "95c666db-e60e-4687-bdd3-1af191fa6799",
                    "givenName": "No",
                    "familyName": "Eppn",
                    "meta": {"created": "2024-02-01T00:00:00Z", "modified": "2024-02-01T00:00:00Z"}
                }
            ],
            "pageToken": "page-2"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/groups"))
        .respond_with(page(json!([
            {
                "id": GROUP_ID,
                "displayName": "1A",
                "groupType": "Klass",
                "organisation": {"id": UNIT_ID},
                "groupMemberships": [{"person": {"id": PERSON_ID}}],
                "meta": {"created": "2024-03-01T00:00:00Z", "modified": "2024-03-02T00:00:00Z"}
            },
            {
                "id": FOREIGN_GROUP_ID,
                "displayName": "Other school's group",
                "groupType": "Klass",
                "organisation": {"id": "99999999-9999-9999-9999-999999999999"},
                "meta": {"created": "2024-03-01T00:00:00Z", "modified": "2024-03-01T00:00:00Z"}
            }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/duties"))
        .respond_with(page(json!([
            {
                "id": DUTY_ID,
                "dutyAt": {"id": UNIT_ID},
                "person": {"id": PERSON_ID},
                "dutyRole": "Lärare",
                "signature": "BJ",
                "meta": {"created": "2024-04-01T00:00:00Z", "modified": "2024-04-01T00:00:00Z"}
            },
            {
                "id": PERSONLESS_DUTY_ID,
                "dutyAt": {"id": UNIT_ID},
                "dutyRole": "Lärare",
                "meta": {"created": "2024-04-01T00:00:00Z", "modified": "2024-04-01T00:00:00Z"}
            }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/activities"))
        .respond_with(page(json!([
            {
                "id": ACTIVITY_ID,
                "displayName": "Math",
                "organisation": {"id": UNIT_ID},
                "groups": [{"id": GROUP_ID}],
                "teachers": [{"duty": {"id": DUTY_ID}}],
                "meta": {"created": "2024-05-01T00:00:00Z", "modified": "2024-05-01T00:00:00Z"}
            }
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_import_populates_the_backend() {
    let server = MockServer::start().await;
    mount_full_import_mocks(&server).await;

    let backend = open_backend().await;
    let reconcile = ReconcileBackend::new(Arc::clone(&backend));
    let client = client_for(&server);
    let history = InMemoryImportHistory::new();
    let token = CancellationToken::new();

    full_import(&token, "skola", &client, &reconcile, &history)
        .await
        .unwrap();

    let orgs = backend.get_resources("skola", "Organisations").await.unwrap();
    assert_eq!(orgs.len(), 1);
    assert!(orgs.contains_key(ORG_ID));

    let units = backend.get_resources("skola", "SchoolUnits").await.unwrap();
    assert_eq!(units.len(), 1);

    // Two pages of persons, minus the one with no principal name.
    let users = backend.get_resources("skola", "Users").await.unwrap();
    assert_eq!(users.len(), 2);
    let babs: serde_json::Value = serde_json::from_str(&users[PERSON_ID]).unwrap();
    assert_eq!(babs["userName"], "baje@x.se");
    assert_eq!(
        babs["urn:scim:schemas:extension:egil:1.0:User"]["externalIdentifiers"][0]["value"],
        "baje2@y.se"
    );

    // The group owned by an unknown organisation is skipped.
    let groups = backend.get_resources("skola", "StudentGroups").await.unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups.contains_key(GROUP_ID));

    // The duty without a person is skipped.
    let employments = backend.get_resources("skola", "Employments").await.unwrap();
    assert_eq!(employments.len(), 1);

    let activities = backend.get_resources("skola", "Activities").await.unwrap();
    assert_eq!(activities.len(), 1);

    // Watermarks advanced to the maxima of the imported objects.
    assert_eq!(
        history
            .most_recently_created("Persons")
            .await
            .unwrap()
            .unwrap()
            .to_rfc3339(),
        "2024-02-02T00:00:00+00:00"
    );
    assert_eq!(
        history
            .most_recently_modified("Persons")
            .await
            .unwrap()
            .unwrap()
            .to_rfc3339(),
        "2024-02-03T00:00:00+00:00"
    );
    assert!(history
        .last_deleted_entities_call()
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn full_import_twice_is_idempotent() {
    let server = MockServer::start().await;
    mount_full_import_mocks(&server).await;

    let backend = open_backend().await;
    let reconcile = ReconcileBackend::new(Arc::clone(&backend));
    let client = client_for(&server);
    let history = InMemoryImportHistory::new();
    let token = CancellationToken::new();

    full_import(&token, "skola", &client, &reconcile, &history)
        .await
        .unwrap();
    full_import(&token, "skola", &client, &reconcile, &history)
        .await
        .unwrap();

    assert_eq!(backend.get_resources("skola", "Users").await.unwrap().len(), 2);
    assert_eq!(
        backend
            .get_resources("skola", "StudentGroups")
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn full_import_removes_rows_the_remote_no_longer_presents() {
    let server = MockServer::start().await;
    mount_full_import_mocks(&server).await;

    let backend = open_backend().await;
    // A user provisioned earlier that the remote doesn't know about.
    backend
        .create(
            "skola",
            "Users",
            &json!({
                "externalId": "00000000-0000-0000-0000-000000000001",
                "userName": "stale@x.se",
                "name": {"familyName": "Stale", "givenName": "User"},
                "displayName": "Stale User"
            })
            .to_string(),
        )
        .await
        .unwrap();

    let reconcile = ReconcileBackend::new(Arc::clone(&backend));
    full_import(
        &CancellationToken::new(),
        "skola",
        &client_for(&server),
        &reconcile,
        &InMemoryImportHistory::new(),
    )
    .await
    .unwrap();

    let users = backend.get_resources("skola", "Users").await.unwrap();
    assert!(!users.contains_key("00000000-0000-0000-0000-000000000001"));
}

#[tokio::test]
async fn incremental_import_applies_deletes_with_resurrection_winning() {
    let server = MockServer::start().await;

    // The tenant already has two groups and their school unit.
    let backend = open_backend().await;
    backend
        .create(
            "skola",
            "SchoolUnits",
            &json!({
                "externalId": UNIT_ID,
                "displayName": "Skolan",
                "schoolUnitCode": "12345678"
            })
            .to_string(),
        )
        .await
        .unwrap();
    for (id, name) in [(GROUP_ID, "1A"), (FOREIGN_GROUP_ID, "1B")] {
        backend
            .create(
                "skola",
                "StudentGroups",
                &json!({
                    "externalId": id,
                    "displayName": name,
                    "owner": {"value": UNIT_ID}
                })
                .to_string(),
            )
            .await
            .unwrap();
    }

    // The remote reports both groups deleted, but one of them also comes
    // back as modified: the resurrection wins.
    Mock::given(method("GET"))
        .and(path("/deletedEntities"))
        .respond_with(page(json!({
            "groups": [GROUP_ID, FOREIGN_GROUP_ID]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/organisations"))
        .and(query_param("type", "Huvudman"))
        .respond_with(page(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/organisations"))
        .and(query_param("type", "Skolenhet"))
        .respond_with(page(json!([
            {
                "id": UNIT_ID,
                "displayName": "Skolan",
                "schoolUnitCode": "12345678",
                "meta": {"created": "2024-01-01T00:00:00Z", "modified": "2024-01-01T00:00:00Z"}
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/groups"))
        .respond_with(page(json!([
            {
                "id": GROUP_ID,
                "displayName": "1A renamed",
                "groupType": "Klass",
                "organisation": {"id": UNIT_ID},
                "groupMemberships": [{"person": {"id": PERSON_ID}}],
                "meta": {"created": "2024-03-01T00:00:00Z", "modified": "2024-06-01T00:00:00Z"}
            }
        ])))
        .mount(&server)
        .await;
    for endpoint in ["/persons", "/duties", "/activities"] {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(page(json!([])))
            .mount(&server)
            .await;
    }

    let reconcile = ReconcileBackend::new(Arc::clone(&backend));
    let history = InMemoryImportHistory::new();
    incremental_import(
        &CancellationToken::new(),
        "skola",
        &client_for(&server),
        &reconcile,
        &history,
    )
    .await
    .unwrap();

    let groups = backend.get_resources("skola", "StudentGroups").await.unwrap();
    // The modified group survived its deletion report, with the update
    // applied; the other reported group is gone.
    assert_eq!(groups.len(), 1);
    let group: serde_json::Value = serde_json::from_str(&groups[GROUP_ID]).unwrap();
    assert_eq!(group["displayName"], "1A renamed");

    // The cursor only advances after the deletes succeed.
    assert!(history
        .last_deleted_entities_call()
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn remote_failure_aborts_the_import() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/organisations"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = open_backend().await;
    let reconcile = ReconcileBackend::new(Arc::clone(&backend));
    let history = InMemoryImportHistory::new();

    let err = full_import(
        &CancellationToken::new(),
        "skola",
        &client_for(&server),
        &reconcile,
        &history,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("principal organisations"));

    // No completion recorded, nothing stamped.
    assert!(history
        .last_deleted_entities_call()
        .await
        .unwrap()
        .is_none());
}
