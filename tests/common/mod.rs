// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use runner_tracker::config::Config;
use runner_tracker::db::{Database, FirestoreDb, MemoryDb};
use runner_tracker::models::Role;
use runner_tracker::routes::create_router;
use runner_tracker::services::{ResultsService, RunnersService, UsersService};
use runner_tracker::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN: (&str, &str) = ("admin", "admin-password");
pub const RUNNER: (&str, &str) = ("runner", "runner-password");

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

/// App backed by in-memory storage, with an admin and a runner account.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
}

/// Build the state by hand so tests can use a cheap bcrypt cost.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    let db = MemoryDb::new();
    let shared: Arc<dyn Database> = Arc::new(db.clone());
    let config = Config::test_default();

    let state = Arc::new(AppState {
        runners_service: RunnersService::new(shared.clone()),
        results_service: ResultsService::new(shared.clone()),
        users_service: UsersService::new(shared, config.session_ttl_minutes)
            .with_hash_cost(4),
        config,
    });

    for ((username, password), role) in [(ADMIN, Role::Admin), (RUNNER, Role::Runner)] {
        state
            .users_service
            .ensure_user(username, password, role)
            .await
            .expect("Failed to seed user");
    }

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
    }
}

#[allow(dead_code)]
impl TestApp {
    /// Send a request and return the status and parsed JSON body (Null if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    /// Log in through the API and return the token.
    pub async fn login(&self, (username, password): (&str, &str)) -> String {
        let credentials = STANDARD.encode(format!("{username}:{password}"));
        let (status, body) = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::AUTHORIZATION, format!("Basic {credentials}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body.as_str().unwrap().to_string()
    }

    /// Send `body` as JSON with the given token.
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Token", token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Send a bodyless request with the given token.
    pub async fn send_empty(&self, method: &str, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Token", token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Create a runner through the API and return its stored ID.
    pub async fn create_runner(&self, token: &str, first_name: &str, country: &str) -> String {
        let (status, _) = self
            .send_json(
                "POST",
                "/runner",
                token,
                serde_json::json!({
                    "first_name": first_name,
                    "last_name": "Tester",
                    "age": 30,
                    "country": country,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, runners) = self.send_empty("GET", "/runner", token).await;
        runners
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["first_name"] == first_name)
            .and_then(|r| r["id"].as_str())
            .unwrap()
            .to_string()
    }
}
