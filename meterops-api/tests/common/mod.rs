//! Shared helpers for meterops-api integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use meterops_api::{build_router, AppState};
use meterops_common::api::auth::{issue_token, HmacTokenVerifier, TokenClaims};
use meterops_common::db::init_database;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

pub const SECRET: &[u8] = b"integration-test-secret-0123456789";

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    // Dropping the directory deletes the database
    _dir: TempDir,
}

impl TestApp {
    /// Send a request and return status plus parsed JSON body (Null if empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, body)
    }
}

/// App backed by a fresh database in a temporary directory
pub async fn setup() -> TestApp {
    setup_with(|state| state).await
}

/// Like `setup`, with a hook to adjust state before the router is built
pub async fn setup_with(adjust: impl FnOnce(AppState) -> AppState) -> TestApp {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = init_database(&dir.path().join("meterops.db"))
        .await
        .expect("Should initialize test database");

    let verifier = HmacTokenVerifier::new(SECRET.to_vec());
    let state = adjust(AppState::new(pool.clone(), Arc::new(verifier)));

    TestApp {
        router: build_router(state),
        pool,
        _dir: dir,
    }
}

pub fn token_for(uid: &str) -> String {
    issue_token(&TokenClaims::new(uid, 3600), SECRET).unwrap()
}

pub fn get(uri: &str, uid: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(uid)))
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, uid: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(uid)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Reading payload from the documented sync example
pub fn reading(id: &str) -> Value {
    json!({
        "readingId": id,
        "accountNumber": "A1",
        "readingValue": 100,
        "confidence": 0.9,
        "method": "ocr",
        "status": "pending",
        "imageUrl": "https://x/y.jpg",
        "capturedAt": "2025-01-01T00:00:00Z",
        "updatedAt": "2025-01-01T00:00:00Z",
        "deviceId": "D1"
    })
}

pub fn sync_body(readings: Vec<Value>) -> Value {
    json!({
        "readings": readings,
        "lastSyncAt": "2025-01-01T00:00:00Z"
    })
}

pub async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}
