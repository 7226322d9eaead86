// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Runner tracker: runners, race results and their best times.
//!
//! This crate provides the REST backend for recording race results and
//! keeping each runner's personal and season best in step with them.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{ResultsService, RunnersService, UsersService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub runners_service: RunnersService,
    pub results_service: ResultsService,
    pub users_service: UsersService,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Database>) -> Self {
        Self {
            runners_service: RunnersService::new(db.clone()),
            results_service: ResultsService::new(db.clone()),
            users_service: UsersService::new(db, config.session_ttl_minutes),
            config,
        }
    }
}
