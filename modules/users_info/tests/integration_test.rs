use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use users_info::{
    api::rest::dto::{UserDto, UserListDto},
    config::UsersInfoConfig,
    contract::{
        client::UsersInfoApi,
        error::UsersInfoError,
        model::{NewUser, UserPatch},
    },
    domain::service::{Service, ServiceConfig},
    gateways::local::UsersInfoLocalClient,
    infra::storage::{JsonFileStore, JsonUsersRepository, UserDocument},
    UsersInfo,
};

/// Fresh store in its own temp dir; keep the `TempDir` alive for the test.
fn create_test_store() -> (TempDir, Arc<JsonFileStore>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(JsonFileStore::new(dir.path().join("users.json")));
    store.ensure_document().expect("Failed to init users document");
    (dir, store)
}

fn create_test_service(store: Arc<JsonFileStore>) -> Arc<Service> {
    let repo = JsonUsersRepository::new(store);
    Arc::new(Service::new(Arc::new(repo), ServiceConfig::default()))
}

fn create_test_router(service: Arc<Service>) -> Router {
    users_info::api::rest::routes::register_routes(Router::new(), service)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_domain_service_crud() -> Result<()> {
    let (_dir, store) = create_test_store();
    let service = create_test_service(store);

    let created = service
        .create_user(NewUser {
            email: "test@email.com".to_string(),
            display_name: "Ivan Ivanov".to_string(),
        })
        .await?;
    assert_eq!(created.id, 1);
    assert_eq!(created.created_at, created.updated_at);

    let retrieved = service.get_user(created.id).await?;
    assert_eq!(retrieved, created);

    let updated = service
        .update_user(
            created.id,
            UserPatch {
                display_name: "Masha".to_string(),
            },
        )
        .await?;
    assert_eq!(updated.display_name, "Masha");
    assert_eq!(updated.email, "test@email.com");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > updated.created_at);

    let snapshot = service.list_users().await?;
    assert_eq!(snapshot.increment, 1);
    assert_eq!(snapshot.users, vec![updated]);

    service.delete_user(created.id).await?;
    assert!(service.get_user(created.id).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_rest_api_walkthrough() {
    let (_dir, store) = create_test_store();
    let router = create_test_router(create_test_service(store.clone()));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "displayName": "Ivan Ivanov", "email": "test@email.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let ivan: UserDto = serde_json::from_value(body).unwrap();
    assert_eq!(ivan.id, 1);
    assert_eq!(ivan.display_name, "Ivan Ivanov");
    assert_eq!(ivan.created, ivan.updated);

    let (status, body) = send(
        &router,
        Method::PATCH,
        "/api/v1/users/1",
        Some(json!({ "displayName": "Masha", "email": "other@email.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let masha: UserDto = serde_json::from_value(body).unwrap();
    assert_eq!(masha.display_name, "Masha");
    assert_eq!(masha.email, "test@email.com", "email is immutable");
    assert_eq!(masha.created, ivan.created);
    assert!(masha.updated > masha.created);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "displayName": "Kar Karich", "email": "poop@mail.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 2);

    let (status, body) = send(&router, Method::GET, "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::OK);
    let list: UserListDto = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(list.increment, 2);
    assert_eq!(list.list.keys().collect::<Vec<_>>(), vec!["1", "2"]);
    assert_eq!(body["list"]["1"]["displayName"], "Masha");

    let (status, body) = send(&router, Method::DELETE, "/api/v1/users/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&router, Method::GET, "/api/v1/users/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["code"], "USERS_NOT_FOUND");
    assert_eq!(body["instance"], "/api/v1/users/1");

    let (_, body) = send(&router, Method::GET, "/api/v1/users", None).await;
    assert_eq!(body["increment"], 2, "deletes never rewind the counter");
    assert!(body["list"].get("1").is_none());

    let on_disk: UserDocument =
        serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
    assert_eq!(on_disk.increment, 2);
    assert_eq!(on_disk.len(), 1);
}

#[tokio::test]
async fn test_rest_not_found_cases() {
    let (_dir, store) = create_test_store();
    let router = create_test_router(create_test_service(store.clone()));
    let before = std::fs::read(store.path()).unwrap();

    for uri in ["/api/v1/users/7", "/api/v1/users/abc", "/api/v1/users/01", "/api/v1/users/0"] {
        let (status, body) = send(&router, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");
        assert_eq!(body["code"], "USERS_NOT_FOUND");

        let (status, _) = send(&router, Method::DELETE, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "DELETE {uri}");

        let (status, _) = send(
            &router,
            Method::PATCH,
            uri,
            Some(json!({ "displayName": "Nobody" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "PATCH {uri}");
    }

    assert_eq!(
        std::fs::read(store.path()).unwrap(),
        before,
        "failed lookups must not rewrite the document"
    );
}

#[tokio::test]
async fn test_rest_bad_requests() {
    let (_dir, store) = create_test_store();
    let router = create_test_router(create_test_service(store));

    // Not JSON at all
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ nope"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );

    // Missing required field
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "displayName": "No Email" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "USERS_BAD_REQUEST");

    // Blank values fail validation
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "displayName": "  ", "email": "a@b.io" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "USERS_VALIDATION");

    let (_, body) = send(&router, Method::GET, "/api/v1/users", None).await;
    assert_eq!(body["increment"], 0, "rejected requests must not allocate ids");
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_ids() -> Result<()> {
    const K: u64 = 32;
    let (_dir, store) = create_test_store();
    let client: Arc<dyn UsersInfoApi> =
        Arc::new(UsersInfoLocalClient::new(create_test_service(store)));

    let mut handles = Vec::new();
    for i in 0..K {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .create_user(NewUser {
                    email: format!("user{i}@example.com"),
                    display_name: format!("User {i}"),
                })
                .await
        }));
    }

    let mut ids = BTreeSet::new();
    for h in handles {
        ids.insert(h.await??.id);
    }
    assert_eq!(ids, (1..=K).collect::<BTreeSet<_>>());

    let snapshot = client.list_users().await?;
    assert_eq!(snapshot.increment, K);
    assert_eq!(snapshot.users.len() as u64, K);
    Ok(())
}

#[test]
fn test_concurrent_store_threads_keep_every_write() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 10;
    let (_dir, store) = create_test_store();

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let store = &store;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    store
                        .create(&format!("t{t}-{i}"), "x@example.com")
                        .expect("create");
                    // Lock-free reads must always see a complete document.
                    store.list().expect("list");
                }
            });
        }
    });

    let doc = store.list().unwrap();
    assert_eq!(doc.increment, THREADS * PER_THREAD);
    assert_eq!(doc.len() as u64, THREADS * PER_THREAD);
}

#[tokio::test]
async fn test_local_client_error_mapping() {
    let (_dir, store) = create_test_store();
    let client = UsersInfoLocalClient::new(create_test_service(store));

    assert_eq!(
        client.get_user(99).await.unwrap_err(),
        UsersInfoError::not_found(99)
    );
    assert_eq!(
        client.delete_user(99).await.unwrap_err(),
        UsersInfoError::not_found(99)
    );
    assert!(matches!(
        client
            .update_user(
                1,
                UserPatch {
                    display_name: String::new()
                }
            )
            .await
            .unwrap_err(),
        UsersInfoError::Validation { .. }
    ));
}

#[tokio::test]
async fn test_module_init_creates_document_under_home() -> Result<()> {
    let home = TempDir::new()?;
    let cfg = UsersInfoConfig {
        storage_path: "data/users.json".to_string(),
        ..Default::default()
    };

    let module = UsersInfo::init(&cfg, home.path()).await?;
    let expected = home.path().join("data").join("users.json");
    assert_eq!(module.storage_path(), expected.as_path());
    assert!(expected.is_file());

    module
        .client()
        .create_user(NewUser {
            email: "a@b.io".into(),
            display_name: "A".into(),
        })
        .await?;

    // Re-initializing keeps existing data
    let again = UsersInfo::init(&cfg, home.path()).await?;
    let snapshot = again.client().list_users().await?;
    assert_eq!(snapshot.increment, 1);
    assert_eq!(snapshot.users[0].display_name, "A");
    Ok(())
}

#[tokio::test]
async fn test_storage_failure_is_500_without_details() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.json");
    std::fs::write(&path, b"{ not json").unwrap();
    let store = Arc::new(JsonFileStore::new(&path));
    let router = create_test_router(create_test_service(store));

    let (status, body) = send(&router, Method::GET, "/api/v1/users", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "INTERNAL_STORAGE");
    assert!(!body["detail"]
        .as_str()
        .unwrap()
        .contains(&*dir.path().to_string_lossy()));
}
