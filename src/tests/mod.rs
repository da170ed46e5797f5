//! Integration and unit tests for the Userbase application.
//!
//! - **api_tests**: CRUD routes through the full router
//! - **auth_tests**: API key middleware
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema, seeding, backfill and upgrades
//! - **error_tests**: error mapping and response bodies
//! - **health_api_tests**: health, readiness and version endpoints

pub mod db_tests;

use std::path::Path;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::avatar::AvatarStyle;
use crate::config::{AppConfig, AuthConfig, AvatarConfig, DatabaseConfig, ServerConfig};
use crate::state::AppState;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    // Keeps the database directory alive for the test's duration
    _dir: TempDir,
}

pub fn test_config(db_file: &Path) -> AppConfig {
    AppConfig {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 3000 },
        database: DatabaseConfig {
            file: Some(db_file.display().to_string()),
            root: ".".to_string(),
            max_connections: 1,
        },
        auth: AuthConfig { api_key: None, header: "x-api-key".to_string() },
        avatar: AvatarConfig { style: AvatarStyle::Portrait },
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir.path().join("data").join("users.db"));
    customize(&mut config);

    let path = config.database_path().unwrap();
    let pool = crate::db::open(&path, config.database.max_connections, config.avatar.style)
        .await
        .unwrap();
    let state = AppState::new(pool, config);
    let app = crate::routes::app(state.clone());

    TestApp { app, state, _dir: dir }
}

pub async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
    headers: &[(&str, &str)],
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let body = body.map(|b| b.to_string());
    let (status, bytes) = send_raw(app, method, uri, body.as_deref(), headers).await;
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}
