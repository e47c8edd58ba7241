//! Common test utilities

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use demo_bank::api::{self, AppState};
use demo_bank::{db, seed, Config};

/// In-memory database with cheap password hashing
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        password_hash_memory_kib: 64,
        password_hash_iterations: 1,
        ..Config::default()
    }
}

/// Fresh schema plus the demo accounts: managers have ids 1-2, `clientN`
/// has id `N + 2`, account `ACC100N` (ACC1010 for client10) and 10000.00.
pub async fn setup_state() -> AppState {
    state_for(test_config()).await
}

/// Same seed in a database file under a fresh temp dir, served by a pool of
/// several connections. Keep the dir alive for as long as the state.
pub async fn setup_file_state() -> (TempDir, AppState) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config {
        database_url: format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("bank.db").display()
        ),
        database_max_connections: 5,
        ..test_config()
    };
    let state = state_for(config).await;
    (dir, state)
}

async fn state_for(config: Config) -> AppState {
    let pool = db::connect(&config).await.expect("Failed to open database");
    db::init_schema(&pool).await.expect("Failed to create schema");

    let state = AppState::new(pool, config).expect("Failed to build state");
    seed::seed_demo_data(&state.pool, &state.hasher)
        .await
        .expect("Failed to seed demo data");
    state
}

pub async fn setup_app() -> (AppState, Router) {
    let state = setup_state().await;
    let app = api::build_router(state.clone());
    (state, app)
}

pub struct RpcReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RpcReply {
    pub fn result(&self) -> &Value {
        &self.body["result"]
    }

    pub fn error_code(&self) -> Option<i64> {
        self.body["error"]["code"].as_i64()
    }
}

/// POST a raw body to /api
pub async fn post_raw(app: &Router, body: String, token: Option<&str>) -> RpcReply {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    RpcReply {
        status,
        headers,
        body,
    }
}

/// Call a JSON-RPC method
pub async fn rpc(app: &Router, method: &str, params: Value, token: Option<&str>) -> RpcReply {
    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    post_raw(app, body.to_string(), token).await
}

/// Log in and return the session token
pub async fn login(app: &Router, login: &str, password: &str) -> String {
    let reply = rpc(
        app,
        "login",
        json!({ "login": login, "password": password }),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.body);
    reply.result()["token"]
        .as_str()
        .expect("login returned no token")
        .to_string()
}
