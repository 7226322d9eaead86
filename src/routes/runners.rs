// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runner routes.

use crate::error::Result;
use crate::models::Runner;
use crate::routes::json_body;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Routes that change runners (admin only).
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/runner", post(create_runner).put(update_runner))
        .route("/runner/{id}", delete(delete_runner))
}

/// Read-only runner routes (any logged in user).
pub fn member_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/runner", get(get_runners_batch))
        .route("/runner/{id}", get(get_runner))
}

async fn create_runner(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Runner>, JsonRejection>,
) -> Result<StatusCode> {
    let runner = json_body(payload)?;
    state.runners_service.create_runner(&runner).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_runner(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<Runner>, JsonRejection>,
) -> Result<StatusCode> {
    let runner = json_body(payload)?;
    state.runners_service.update_runner(&runner).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_runner(
    State(state): State<Arc<AppState>>,
    Path(runner_id): Path<String>,
) -> Result<StatusCode> {
    state.runners_service.delete_runner(&runner_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_runner(
    State(state): State<Arc<AppState>>,
    Path(runner_id): Path<String>,
) -> Result<Json<Runner>> {
    Ok(Json(state.runners_service.get_runner(&runner_id).await?))
}

#[derive(Deserialize)]
struct BatchQuery {
    country: Option<String>,
    /// Kept as text so a malformed year is reported by the service
    year: Option<String>,
}

async fn get_runners_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<Vec<Runner>>> {
    let runners = state
        .runners_service
        .get_runners_batch(query.country.as_deref(), query.year.as_deref())
        .await?;
    Ok(Json(runners))
}
