// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod best_times;
pub mod race_time;
pub mod result;
pub mod runner;
pub mod user;

pub use best_times::{BestTimes, CorruptBest};
pub use race_time::{RaceTime, RaceTimeError};
pub use result::RaceResult;
pub use runner::{Runner, RunnerStatus};
pub use user::{Role, Session, User};
