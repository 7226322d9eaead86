// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runner tracker API server
//!
//! Records runners and their race results, keeping each runner's personal
//! and season best up to date.

use runner_tracker::{
    config::{Config, StorageBackend},
    db::{Database, FirestoreDb, MemoryDb},
    models::Role,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting runner tracker API");

    let db: Arc<dyn Database> = match &config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
        StorageBackend::Firestore { project_id } => {
            Arc::new(FirestoreDb::new(project_id).await?)
        }
    };

    let state = Arc::new(AppState::new(config.clone(), db));

    if let Some(admin) = &config.bootstrap_admin {
        state
            .users_service
            .ensure_user(&admin.username, &admin.password, Role::Admin)
            .await?;
    }

    // Build router
    let app = runner_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("runner_tracker=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
