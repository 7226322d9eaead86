// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token authentication middleware.
//!
//! Clients send the token issued by `/login` in a `Token` header. Each route
//! group is guarded by the set of roles allowed to call it.

use crate::error::{AppError, Result};
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "Token";

/// Roles allowed on admin-only routes.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Roles allowed on routes any logged in user may call.
pub const ANY_MEMBER: &[Role] = &[Role::Admin, Role::Runner];

/// Token from the request headers, or empty if absent or not valid text.
pub fn token_from_headers(headers: &HeaderMap) -> &str {
    headers
        .get(TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

async fn authorize_request(state: &AppState, headers: &HeaderMap, allowed: &[Role]) -> Result<()> {
    let token = token_from_headers(headers);
    if state.users_service.authorize(token, allowed).await? {
        Ok(())
    } else {
        tracing::debug!(?allowed, "Token role not permitted on route");
        Err(AppError::Unauthorized("Failed to authorize user".to_string()))
    }
}

/// Middleware admitting admins only.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    authorize_request(&state, request.headers(), ADMIN_ONLY).await?;
    Ok(next.run(request).await)
}

/// Middleware admitting any logged in user.
pub async fn require_member(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response> {
    authorize_request(&state, request.headers(), ANY_MEMBER).await?;
    Ok(next.run(request).await)
}
