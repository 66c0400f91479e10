// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use studenthub::config::Config;
use studenthub::db::FirestoreDb;
use studenthub::middleware::auth::create_jwt;
use studenthub::routes::create_router;
use studenthub::AppState;
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

fn build_app(config: Config, db: FirestoreDb) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, db).expect("Failed to build app state"));
    (create_router(state.clone()), state)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    build_app(Config::test_default(), test_db_offline())
}

/// Offline test app with secure (cross-site) cookies.
#[allow(dead_code)]
pub fn create_test_app_with_secure_cookies() -> (Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.cookie_secure = true;
    build_app(config, test_db_offline())
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (Router, Arc<AppState>) {
    build_app(Config::test_default(), test_db().await)
}

/// Token for `user_id` signed with the test config's key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str) -> String {
    create_jwt(user_id, &Config::test_default().jwt_signing_key).expect("Failed to create JWT")
}

/// Unique suffix for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Send a JSON request, optionally authenticated, and decode the body.
#[allow(dead_code)]
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// A signed-up user as seen by the tests.
#[allow(dead_code)]
pub struct TestUser {
    pub id: String,
    pub token: String,
    pub email: String,
}

/// Sign a fresh user up through the API.
#[allow(dead_code)]
pub async fn signup(app: &Router, name: &str, extra: Value) -> TestUser {
    let email = format!("{}-{}@example.edu", name.to_lowercase(), unique_suffix());
    let mut body = serde_json::json!({
        "name": name,
        "email": email,
        "password": "hunter22",
        "college": "State University",
        "educationLevel": "Undergraduate",
    });
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            body.insert(k.clone(), v.clone());
        }
    }

    let (status, json) = send_json(app, "POST", "/api/auth/signup", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {json}");

    TestUser {
        id: json["data"]["user"]["id"].as_str().unwrap().to_string(),
        token: json["data"]["token"].as_str().unwrap().to_string(),
        email,
    }
}
