// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login and logout.

use crate::error::{AppError, Result};
use crate::middleware::auth::token_from_headers;
use crate::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Username and password from an `Authorization: Basic` header.
fn basic_credentials(headers: &HeaderMap) -> Result<(String, String)> {
    let invalid = || AppError::BadRequest("Invalid authorization header".to_string());

    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(invalid)?;

    let (scheme, encoded) = value.split_once(' ').ok_or_else(invalid)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(invalid());
    }

    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
    let (username, password) = decoded.split_once(':').ok_or_else(invalid)?;
    Ok((username.to_string(), password.to_string()))
}

/// Exchange Basic credentials for a session token.
async fn login(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<String>> {
    let (username, password) = basic_credentials(&headers)?;
    let token = state.users_service.login(&username, &password).await?;
    Ok(Json(token))
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<StatusCode> {
    state
        .users_service
        .logout(token_from_headers(&headers))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
