//! Integration tests for the SQL backend, run against SQLite.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use windermere_db::{downgrade_schema, BulkOperation, SqlBackend, StorageError};
use windermere_model::parse_resource;

fn temp_db_url() -> String {
    let path = std::env::temp_dir().join(format!("windermere-test-{}.db", uuid::Uuid::new_v4()));
    format!("sqlite://{}?mode=rwc", path.display())
}

async fn open_backend(url: &str) -> SqlBackend {
    SqlBackend::open(url, Arc::new(|rt, body| parse_resource(rt, body)))
        .await
        .expect("backend should open")
}

fn user_body(id: &str, user_name: &str) -> String {
    json!({
        "externalId": id,
        "userName": user_name,
        "name": {"familyName": "Jensen", "givenName": "Barbara"},
        "displayName": "Babs",
        "emails": [{"value": user_name, "type": "work"}],
        "urn:scim:schemas:extension:sis:school:1.0:User": {
            "enrolments": [{"value": "12345678", "schoolYear": 3}]
        }
    })
    .to_string()
}

const USER_ID: &str = "75c666db-e60e-4687-bdd3-1af191fa6799";

#[tokio::test]
async fn create_get_update_delete_user() {
    let backend = open_backend(&temp_db_url()).await;

    let created = backend
        .create("tenant-a", "Users", &user_body(USER_ID, "baje@x.se"))
        .await
        .unwrap();
    let created: Value = serde_json::from_str(&created).unwrap();
    assert_eq!(created["userName"], "baje@x.se");

    let fetched = backend
        .get_resource("tenant-a", "Users", USER_ID)
        .await
        .unwrap();
    let fetched: Value = serde_json::from_str(&fetched).unwrap();
    assert_eq!(fetched["externalId"], USER_ID);
    assert_eq!(fetched["userName"], "baje@x.se");
    assert_eq!(fetched["emails"][0]["value"], "baje@x.se");
    assert_eq!(
        fetched["urn:scim:schemas:extension:sis:school:1.0:User"]["enrolments"][0]["schoolYear"],
        3
    );

    backend
        .update(
            "tenant-a",
            "Users",
            USER_ID,
            &user_body(USER_ID, "baje12@x.se"),
        )
        .await
        .unwrap();
    let fetched = backend
        .get_resource("tenant-a", "Users", USER_ID)
        .await
        .unwrap();
    let fetched: Value = serde_json::from_str(&fetched).unwrap();
    assert_eq!(fetched["userName"], "baje12@x.se");
    // Child rows are replaced, not merged.
    assert_eq!(fetched["emails"].as_array().unwrap().len(), 1);
    assert_eq!(fetched["emails"][0]["value"], "baje12@x.se");

    backend.delete("tenant-a", "Users", USER_ID).await.unwrap();
    let err = backend
        .get_resource("tenant-a", "Users", USER_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MissingResource(_)));
}

#[tokio::test]
async fn create_twice_is_a_conflict() {
    let backend = open_backend(&temp_db_url()).await;
    let body = user_body(USER_ID, "baje@x.se");

    backend.create("tenant-a", "Users", &body).await.unwrap();
    let err = backend.create("tenant-a", "Users", &body).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn update_of_absent_resource_is_missing() {
    let backend = open_backend(&temp_db_url()).await;
    let err = backend
        .update("tenant-a", "Users", USER_ID, &user_body(USER_ID, "x@x.se"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MissingResource(_)));

    let err = backend
        .delete("tenant-a", "Users", USER_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MissingResource(_)));
}

#[tokio::test]
async fn malformed_resource_is_rejected() {
    let backend = open_backend(&temp_db_url()).await;
    let err = backend
        .create("tenant-a", "Users", r#"{"externalId": "x"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MalformedResource(_)));
}

#[tokio::test]
async fn unknown_resource_type_is_infrastructure() {
    let backend = open_backend(&temp_db_url()).await;
    let err = backend
        .create("tenant-a", "Unicorns", "{}")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UnknownResourceType(_)));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn tenants_are_isolated() {
    let backend = open_backend(&temp_db_url()).await;
    let body = user_body(USER_ID, "baje@x.se");

    backend.create("tenant-a", "Users", &body).await.unwrap();
    backend.create("tenant-b", "Users", &body).await.unwrap();

    backend.delete("tenant-a", "Users", USER_ID).await.unwrap();
    assert!(backend
        .get_resource("tenant-b", "Users", USER_ID)
        .await
        .is_ok());

    backend.create("tenant-a", "Users", &body).await.unwrap();
    backend.clear("tenant-a").await.unwrap();
    assert!(backend
        .get_resource("tenant-a", "Users", USER_ID)
        .await
        .is_err());
    assert!(backend
        .get_resource("tenant-b", "Users", USER_ID)
        .await
        .is_ok());
}

#[tokio::test]
async fn deleting_a_parent_cascades_to_child_rows() {
    let backend = open_backend(&temp_db_url()).await;

    backend
        .create("t", "Users", &user_body(USER_ID, "baje@x.se"))
        .await
        .unwrap();
    backend.delete("t", "Users", USER_ID).await.unwrap();

    // Re-creating the same id without collections must read back empty
    // collections; stale child rows would resurface here.
    let body = json!({
        "externalId": USER_ID,
        "userName": "baje@x.se",
        "name": {"familyName": "Jensen", "givenName": "Barbara"},
        "displayName": "Babs"
    })
    .to_string();
    backend.create("t", "Users", &body).await.unwrap();
    let fetched: Value =
        serde_json::from_str(&backend.get_resource("t", "Users", USER_ID).await.unwrap()).unwrap();
    assert_eq!(fetched["emails"].as_array().unwrap().len(), 0);
    assert!(fetched["urn:scim:schemas:extension:sis:school:1.0:User"]["enrolments"].is_null());
}

#[tokio::test]
async fn student_group_memberships_cascade_and_replace() {
    let backend = open_backend(&temp_db_url()).await;
    let group_id = "39074b36-e0ed-4443-a501-5148992014b9";
    let body = |members: Vec<&str>| {
        json!({
            "externalId": group_id,
            "displayName": "1A",
            "owner": {"value": "c8331abf-2b84-4dd6-a921-a8d4ff06ca4c"},
            "studentGroupType": "Klass",
            "studentMemberships": members.iter().map(|m| json!({"value": m})).collect::<Vec<_>>()
        })
        .to_string()
    };

    backend
        .create("t", "StudentGroups", &body(vec![USER_ID, "another-id"]))
        .await
        .unwrap();
    backend
        .update("t", "StudentGroups", group_id, &body(vec![USER_ID]))
        .await
        .unwrap();

    let fetched: Value = serde_json::from_str(
        &backend
            .get_resource("t", "StudentGroups", group_id)
            .await
            .unwrap(),
    )
    .unwrap();
    let memberships = fetched["studentMemberships"].as_array().unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0]["value"], USER_ID);
}

#[tokio::test]
async fn activity_and_school_unit_round_trip() {
    let backend = open_backend(&temp_db_url()).await;

    let unit_id = "c8331abf-2b84-4dd6-a921-a8d4ff06ca4c";
    let unit = json!({
        "externalId": unit_id,
        "displayName": "Skolan",
        "schoolUnitCode": "12345678",
        "organisation": {"value": "11111111-2222-3333-4444-555555555555"},
        "schoolTypes": ["GR", "GY"],
        "municipalityCode": "0180"
    })
    .to_string();
    backend.create("t", "SchoolUnits", &unit).await.unwrap();
    let fetched: Value =
        serde_json::from_str(&backend.get_resource("t", "SchoolUnits", unit_id).await.unwrap())
            .unwrap();
    assert_eq!(fetched["schoolUnitCode"], "12345678");
    assert_eq!(fetched["schoolTypes"].as_array().unwrap().len(), 2);
    assert_eq!(fetched["municipalityCode"], "0180");

    let activity_id = "c9749d05-b363-4a49-a364-053b30de3f91";
    let activity = json!({
        "externalId": activity_id,
        "displayName": "Math",
        "owner": {"value": unit_id},
        "groups": [{"value": "39074b36-e0ed-4443-a501-5148992014b9"}],
        "teachers": [{"value": "8d2e8b2f-21ae-42ea-a35a-b551b1b3a2ca"}]
    })
    .to_string();
    backend.create("t", "Activities", &activity).await.unwrap();
    let fetched: Value = serde_json::from_str(
        &backend
            .get_resource("t", "Activities", activity_id)
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(fetched["groups"].as_array().unwrap().len(), 1);
    assert_eq!(fetched["teachers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn get_resources_returns_all_for_tenant() {
    let backend = open_backend(&temp_db_url()).await;
    for (id, name) in [
        ("75c666db-e60e-4687-bdd3-1af191fa6799", "a@x.se"),
        ("85c666db-e60e-4687-bdd3-1af191fa6799", "b@x.se"),
    ] {
        backend
            .create("t", "Users", &user_body(id, name))
            .await
            .unwrap();
    }
    let all = backend.get_resources("t", "Users").await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains_key("75c666db-e60e-4687-bdd3-1af191fa6799"));
}

#[tokio::test]
async fn bulk_isolates_a_poison_operation() {
    let backend = open_backend(&temp_db_url()).await;

    let existing = "00000000-0000-0000-0000-00000000aaaa";
    backend
        .create("t", "Users", &user_body(existing, "exists@x.se"))
        .await
        .unwrap();

    let mut operations = Vec::new();
    for i in 0..10 {
        let id = if i == 4 {
            existing.to_string()
        } else {
            format!("00000000-0000-0000-0000-0000000000{i:02}")
        };
        operations.push(BulkOperation::Create {
            resource_type: "Users".to_string(),
            resource: user_body(&id, &format!("user{i}@x.se")),
        });
    }

    let token = CancellationToken::new();
    let results = backend.bulk(&token, "t", &operations).await.unwrap();

    assert_eq!(results.len(), 10);
    for (i, result) in results.iter().enumerate() {
        if i == 4 {
            assert!(matches!(result.error, Some(StorageError::Conflict(_))));
        } else {
            assert!(result.error.is_none(), "operation {i} should succeed");
        }
    }

    // The nine good operations took effect.
    let all = backend.get_resources("t", "Users").await.unwrap();
    assert_eq!(all.len(), 10);
}

#[tokio::test]
async fn bulk_handles_batches_beyond_transaction_size() {
    let backend = open_backend(&temp_db_url()).await;

    let operations: Vec<_> = (0..60)
        .map(|i| BulkOperation::Create {
            resource_type: "Organisations".to_string(),
            resource: json!({
                "externalId": format!("00000000-0000-0000-0000-00000000{i:04}"),
                "displayName": format!("Org {i}")
            })
            .to_string(),
        })
        .collect();

    let token = CancellationToken::new();
    let results = backend.bulk(&token, "t", &operations).await.unwrap();
    assert_eq!(results.len(), 60);
    assert!(results.iter().all(|r| r.error.is_none()));
    assert_eq!(
        backend.get_resources("t", "Organisations").await.unwrap().len(),
        60
    );
}

#[tokio::test]
async fn bulk_respects_cancellation() {
    let backend = open_backend(&temp_db_url()).await;
    let token = CancellationToken::new();
    token.cancel();

    let operations = vec![BulkOperation::Delete {
        resource_type: "Users".to_string(),
        resource_id: USER_ID.to_string(),
    }];
    let err = backend.bulk(&token, "t", &operations).await.unwrap_err();
    assert!(matches!(err, StorageError::Cancelled(_)));
}

#[tokio::test]
async fn bulk_preserves_input_order_with_mixed_operations() {
    let backend = open_backend(&temp_db_url()).await;
    backend
        .create("t", "Users", &user_body(USER_ID, "baje@x.se"))
        .await
        .unwrap();

    let operations = vec![
        BulkOperation::Update {
            resource_type: "Users".to_string(),
            resource_id: USER_ID.to_string(),
            resource: user_body(USER_ID, "updated@x.se"),
        },
        BulkOperation::Create {
            resource_type: "Users".to_string(),
            resource: user_body("00000000-0000-0000-0000-00000000bbbb", "new@x.se"),
        },
        BulkOperation::Delete {
            resource_type: "Users".to_string(),
            resource_id: "not-there".to_string(),
        },
    ];
    let token = CancellationToken::new();
    let results = backend.bulk(&token, "t", &operations).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].error.is_none());
    assert!(results[1].error.is_none());
    assert!(matches!(
        results[2].error,
        Some(StorageError::MissingResource(_))
    ));

    let fetched: Value =
        serde_json::from_str(&backend.get_resource("t", "Users", USER_ID).await.unwrap()).unwrap();
    assert_eq!(fetched["userName"], "updated@x.se");
}

#[tokio::test]
async fn schema_downgrade_and_remigration() {
    let url = temp_db_url();
    {
        let _backend = open_backend(&url).await;
    }

    downgrade_schema(&url, 1).await.unwrap();

    // Downgrading below the current version again fails.
    let err = downgrade_schema(&url, 1).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidDowngrade { .. }));

    // Re-opening migrates forward again.
    let backend = open_backend(&url).await;
    backend
        .create("t", "Users", &user_body(USER_ID, "baje@x.se"))
        .await
        .unwrap();
}
