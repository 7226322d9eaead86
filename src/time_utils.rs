// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time.

use chrono::{DateTime, Datelike, Utc};

/// Calendar year of `now`, in UTC.
pub fn year_of(now: DateTime<Utc>) -> i32 {
    now.year()
}

/// Current calendar year in UTC. Season bests are scoped to this year.
pub fn current_year() -> i32 {
    year_of(Utc::now())
}
