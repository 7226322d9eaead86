// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Login exchanges Basic credentials for a token
//! 2. Protected routes check the token and its role
//! 3. Logout ends the session
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use runner_tracker::db::UserStore;
use runner_tracker::models::Session;

mod common;
use common::{create_test_app, ADMIN, RUNNER};

fn login_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/login");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_login_returns_token_string() {
    let app = create_test_app().await;
    let token = app.login(ADMIN).await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = create_test_app().await;
    let credentials = STANDARD.encode("admin:nope");

    let (status, body) = app
        .send(login_request(Some(&format!("Basic {credentials}"))))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Login failed");
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_login_without_basic_auth() {
    let app = create_test_app().await;

    let (status, body) = app.send(login_request(None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = app.send(login_request(Some("Basic %%%"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = create_test_app().await;

    let (status, body) = app.send_empty("GET", "/runner", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid access token");
}

#[tokio::test]
async fn test_protected_route_with_unknown_token() {
    let app = create_test_app().await;

    let (status, body) = app.send_empty("GET", "/runner", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_runner_role_can_read_but_not_write() {
    let app = create_test_app().await;
    let token = app.login(RUNNER).await;

    let (status, _) = app.send_empty("GET", "/runner", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send_json(
            "POST",
            "/runner",
            &token,
            serde_json::json!({
                "first_name": "Mo",
                "last_name": "Farah",
                "age": 41,
                "country": "United Kingdom",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send_empty("DELETE", "/result/anything", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = create_test_app().await;
    let user = app
        .db
        .get_user_by_username(ADMIN.0)
        .await
        .unwrap()
        .unwrap();
    app.db
        .set_session(
            &user.id,
            &Session {
                access_token: "expired".to_string(),
                access_token_expiry: Utc::now() - Duration::minutes(1),
            },
        )
        .await
        .unwrap();

    let (status, _) = app.send_empty("GET", "/runner", "expired").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let app = create_test_app().await;
    let token = app.login(ADMIN).await;

    let (status, _) = app.send_empty("POST", "/logout", &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send_empty("GET", "/runner", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send_empty("POST", "/logout", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_new_login_replaces_previous_token() {
    let app = create_test_app().await;
    let first = app.login(ADMIN).await;
    let second = app.login(ADMIN).await;
    assert_ne!(first, second);

    let (status, _) = app.send_empty("GET", "/runner", &first).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send_empty("GET", "/runner", &second).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = create_test_app().await;
    let (status, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = create_test_app().await;

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        Request::builder()
            .method("OPTIONS")
            .uri("/runner")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "token")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
    let allowed = headers
        .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(allowed.contains("token"));
}
