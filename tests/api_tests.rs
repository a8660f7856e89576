use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header},
    routing::get,
};
use roster_portal::{
    ApiClient, ApiError, AppConfig, AppState, create_router,
    proxy::{forwardable_headers, rewrite_path},
    session::MemoryStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Student {
    id: u32,
    name: String,
}

// --- Stub Roster API ---

fn stub_routes() -> Router {
    Router::new()
        .route(
            "/students",
            get(|| async {
                Json(vec![Student {
                    id: 1,
                    name: "Kim".to_string(),
                }])
            })
            .post(|Json(student): Json<Student>| async move { Json(student) }),
        )
        .route(
            "/students/{id}",
            get(|Path(id): Path<u32>| async move {
                Json(Student {
                    id,
                    name: format!("student-{id}"),
                })
            })
            .put(|Path(id): Path<u32>, Json(mut student): Json<Student>| async move {
                student.id = id;
                Json(student)
            })
            .delete(|| async { StatusCode::NO_CONTENT }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({ "late": true }))
            }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/not-json", get(|| async { "hello" }))
        .route(
            "/echo-host",
            get(|headers: HeaderMap| async move {
                let host = headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "host": host }))
            }),
        )
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

async fn spawn_stub() -> String {
    serve(stub_routes()).await
}

/// Serves the portal with its dev proxy pointed at `target`.
async fn spawn_portal(target: &str, change_origin: bool) -> String {
    let mut config = AppConfig::default();
    config.proxy.target = target.to_string();
    config.proxy.change_origin = change_origin;

    let upstream = ApiClient::new(target, config.api_timeout).unwrap();
    let state = AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(upstream)).unwrap();
    serve(create_router(state)).await
}

// --- ApiClient ---

#[tokio::test]
async fn test_get_json() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base, Duration::from_millis(5000)).unwrap();

    let students: Vec<Student> = client.get_json("/students").await.unwrap();
    assert_eq!(
        students,
        vec![Student {
            id: 1,
            name: "Kim".to_string()
        }]
    );

    // Leading slash is optional.
    let student: Student = client.get_json("students/7").await.unwrap();
    assert_eq!(student.name, "student-7");
}

#[tokio::test]
async fn test_post_put_delete() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&format!("{base}/"), Duration::from_millis(5000)).unwrap();
    let lee = Student {
        id: 2,
        name: "Lee".to_string(),
    };

    let created: Student = client.post_json("/students", &lee).await.unwrap();
    assert_eq!(created, lee);

    let updated: Student = client.put_json("/students/9", &lee).await.unwrap();
    assert_eq!(updated.id, 9);

    client.delete("/students/9").await.unwrap();
}

#[tokio::test]
async fn test_error_status_is_surfaced() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base, Duration::from_millis(5000)).unwrap();

    let result = client.get_json::<serde_json::Value>("/missing").await;
    assert!(matches!(
        result,
        Err(ApiError::Status {
            status: StatusCode::NOT_FOUND
        })
    ));
}

#[tokio::test]
async fn test_undecodable_body() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base, Duration::from_millis(5000)).unwrap();

    let result = client.get_json::<Vec<Student>>("/not-json").await;
    assert!(matches!(result, Err(ApiError::Decode(_))));
}

#[tokio::test]
async fn test_timeout() {
    let base = spawn_stub().await;
    let client = ApiClient::new(&base, Duration::from_millis(50)).unwrap();

    let result = client.get_json::<serde_json::Value>("/slow").await;
    match result {
        Err(ApiError::Timeout(after)) => assert_eq!(after, Duration::from_millis(50)),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_failure() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = ApiClient::new(&format!("http://127.0.0.1:{port}"), Duration::from_millis(1000)).unwrap();
    let result = client.get_json::<serde_json::Value>("/students").await;
    assert!(matches!(result, Err(ApiError::Connect(_))));
}

#[test]
fn test_invalid_base_url() {
    assert!(matches!(
        ApiClient::new("not a url", Duration::from_millis(5000)),
        Err(ApiError::InvalidUrl(_))
    ));
    assert!(matches!(
        ApiClient::new("ftp://example.com", Duration::from_millis(5000)),
        Err(ApiError::InvalidUrl(_))
    ));
}

#[test]
fn test_default_client_settings() {
    let config = AppConfig::default();
    let client = ApiClient::new(&config.api_base_url, config.api_timeout).unwrap();
    assert_eq!(client.base_url(), "https://paint-speckle-kumquat.glitch.me");
    assert_eq!(client.timeout(), Duration::from_millis(5000));
    assert_eq!(
        client.url("students"),
        "https://paint-speckle-kumquat.glitch.me/students"
    );
}

// --- Proxy Rewriting ---

#[test]
fn test_rewrite_path() {
    assert_eq!(rewrite_path("/api", "/api/students"), "/students");
    assert_eq!(rewrite_path("/api", "/api/teams/edit?id=3"), "/teams/edit?id=3");
    assert_eq!(rewrite_path("/api", "/api"), "/");
    assert_eq!(rewrite_path("/api", "/api?x=1"), "/?x=1");
    assert_eq!(rewrite_path("/api/", "/api/students"), "/students");
    // Only a leading prefix is removed.
    assert_eq!(rewrite_path("/api", "/students/api"), "/students/api");
}

#[test]
fn test_forwardable_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(header::HOST, "localhost:5173".parse().unwrap());
    headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
    headers.insert(header::CONTENT_LENGTH, "12".parse().unwrap());
    headers.insert(header::ACCEPT, "application/json".parse().unwrap());

    let changed = forwardable_headers(&headers, true);
    assert!(!changed.contains_key(header::HOST));
    assert!(!changed.contains_key(header::CONNECTION));
    assert!(!changed.contains_key(header::CONTENT_LENGTH));
    assert_eq!(changed[header::ACCEPT], "application/json");

    let kept = forwardable_headers(&headers, false);
    assert_eq!(kept[header::HOST], "localhost:5173");
}

// --- End-to-end Proxy ---

#[tokio::test]
async fn test_proxy_end_to_end() {
    let stub = spawn_stub().await;
    let portal = spawn_portal(&stub, true).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{portal}/api/students"))
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), 200);
    let students: Vec<Student> = response.json().await.unwrap();
    assert_eq!(students[0].name, "Kim");

    let response = client
        .post(format!("{portal}/api/students"))
        .json(&Student {
            id: 5,
            name: "Park".to_string(),
        })
        .send()
        .await
        .unwrap();
    let created: Student = response.json().await.unwrap();
    assert_eq!(created.name, "Park");

    let response = client
        .get(format!("{portal}/api/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_proxy_change_origin() {
    let stub = spawn_stub().await;
    let stub_host = stub.trim_start_matches("http://").to_string();
    let client = reqwest::Client::new();

    let portal = spawn_portal(&stub, true).await;
    let body: serde_json::Value = client
        .get(format!("{portal}/api/echo-host"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["host"], stub_host);

    let portal = spawn_portal(&stub, false).await;
    let portal_host = portal.trim_start_matches("http://").to_string();
    let body: serde_json::Value = client
        .get(format!("{portal}/api/echo-host"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["host"], portal_host);
}

#[tokio::test]
async fn test_proxy_timeout_end_to_end() {
    let stub = spawn_stub().await;

    let mut config = AppConfig::default();
    config.proxy.target = stub.clone();
    let upstream = ApiClient::new(&stub, Duration::from_millis(50)).unwrap();
    let state = AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(upstream)).unwrap();
    let portal = serve(create_router(state)).await;

    let response = reqwest::get(format!("{portal}/api/slow")).await.unwrap();
    assert_eq!(response.status(), 504);
}
