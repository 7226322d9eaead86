// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race result routes (admin only).

use crate::error::Result;
use crate::models::RaceResult;
use crate::routes::json_body;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use std::sync::Arc;

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/result", post(create_result))
        .route("/result/{id}", delete(delete_result))
}

/// Record a result and return it with its assigned ID.
async fn create_result(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RaceResult>, JsonRejection>,
) -> Result<Json<RaceResult>> {
    let result = json_body(payload)?;
    let created = state.results_service.create_result(&result).await?;
    Ok(Json(created))
}

async fn delete_result(
    State(state): State<Arc<AppState>>,
    Path(result_id): Path<String>,
) -> Result<StatusCode> {
    state.results_service.delete_result(&result_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
