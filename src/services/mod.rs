// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod results;
pub mod runners;
pub mod users;

pub use results::ResultsService;
pub use runners::RunnersService;
pub use users::UsersService;
