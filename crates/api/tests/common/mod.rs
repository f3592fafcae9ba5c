#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use synchub_api::auth::{Cache, MemoryCache};
use synchub_api::config::ServerConfig;
use synchub_api::router::build_app_router;
use synchub_api::state::AppState;
use synchub_db::{MemoryStore, Store};

/// Upload limit used by test configs.
pub const TEST_MAX_FILE_SIZE: u64 = 1024;

// ---------------------------------------------------------------------------
// Stub identity service
// ---------------------------------------------------------------------------

/// An identity service on `127.0.0.1:0` that counts `/validate` calls.
///
/// Tokens of the form `t-<user>` are valid for `<user>`. `down` answers 503,
/// `forbidden` answers 403, anything else answers `valid=false`.
pub struct StubIdentity {
    pub url: String,
    pub calls: Arc<AtomicUsize>,
}

impl StubIdentity {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub async fn spawn_identity_service() -> StubIdentity {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let app = Router::new().route(
        "/validate",
        post(move |Json(body): Json<Value>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let token = body["token"].as_str().unwrap_or_default().to_string();
                match token.as_str() {
                    "down" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
                    "forbidden" => StatusCode::FORBIDDEN.into_response(),
                    t => match t.strip_prefix("t-") {
                        Some(user) => Json(json!({
                            "valid": true,
                            "user_id": user,
                            "email": format!("{user}@example.com"),
                            "roles": ["user"],
                        }))
                        .into_response(),
                        None => Json(json!({ "valid": false })).into_response(),
                    },
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubIdentity {
        url: format!("http://{addr}"),
        calls,
    }
}

// ---------------------------------------------------------------------------
// Test hub
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` through the same env parser production uses.
pub fn test_config(auth_service_url: &str, storage_path: &std::path::Path) -> ServerConfig {
    let env: HashMap<&str, String> = HashMap::from([
        ("API_PORT", "0".to_string()),
        ("UI_PORT", "5173".to_string()),
        ("AUTH_SERVICE_URL", auth_service_url.to_string()),
        ("STORAGE_PATH", storage_path.display().to_string()),
        ("POSTGRES_URL", "postgres://test@localhost/test".to_string()),
        ("MAX_FILE_SIZE", TEST_MAX_FILE_SIZE.to_string()),
        ("IDENTITY_TIMEOUT_SECS", "2".to_string()),
    ]);
    ServerConfig::from_lookup(|key| env.get(key).cloned()).unwrap()
}

/// A fully wired hub over `MemoryStore` with a running fan-out worker.
pub struct TestHub {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub identity: StubIdentity,
    pub storage_dir: TempDir,
}

pub async fn build_test_hub() -> TestHub {
    build_test_hub_with_cache(Arc::new(MemoryCache::new())).await
}

pub async fn build_test_hub_with_cache(cache: Arc<dyn Cache>) -> TestHub {
    let identity = spawn_identity_service().await;
    let storage_dir = tempfile::tempdir().unwrap();
    let config = test_config(&identity.url, storage_dir.path());

    let store = Arc::new(MemoryStore::new(config.default_expiry_hours));
    let dyn_store: Arc<dyn Store> = store.clone();
    let (state, worker) = AppState::build(config.clone(), dyn_store, cache).unwrap();
    state.storage.ensure_layout().await.unwrap();
    tokio::spawn(worker.run());

    let app = build_app_router(state.clone(), &config);

    TestHub {
        app,
        state,
        store,
        identity,
        storage_dir,
    }
}

/// Serve `app` on an ephemeral port for WebSocket tests.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Send a GET request, optionally authenticated.
pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Send a JSON body with the given method and bearer token.
pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    body: Value,
) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send_json(app, Method::POST, uri, token, body).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(header::AUTHORIZATION, bearer(token))
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Register a device for the user behind `token` and return its id.
pub async fn register_device(app: &Router, token: &str, name: &str) -> uuid::Uuid {
    let response = post_json(
        app,
        "/api/v1/devices",
        token,
        json!({ "name": name, "type": "laptop", "platform": "linux" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["id"].as_str().unwrap().parse().unwrap()
}
