// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached best times for a runner.
//!
//! A runner's `personal_best` is the fastest of all its results and its
//! `season_best` the fastest of its results in the current calendar year.
//! These fields are only ever written through [`BestTimes`]. The personal
//! best is folded forward on creation and recomputed on deletion when the
//! deleted result backed it. The season best is always taken from the
//! current year's results, so a value left over from an earlier year is
//! replaced as soon as the runner's results change.

use serde::{Deserialize, Serialize};

use crate::models::{RaceResult, RaceTime, RaceTimeError, Runner};

/// The two cached best-time fields, stored as the winning result's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestTimes {
    pub personal_best: Option<String>,
    pub season_best: Option<String>,
}

/// Which cached field held a value that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptBest {
    #[error("Failed to parse personal best: {0}")]
    PersonalBest(RaceTimeError),
    #[error("Failed to parse season best: {0}")]
    SeasonBest(RaceTimeError),
}

impl BestTimes {
    pub fn of(runner: &Runner) -> Self {
        Self {
            personal_best: runner.personal_best.clone(),
            season_best: runner.season_best.clone(),
        }
    }

    /// Fold a newly recorded result into the cached bests.
    ///
    /// `time` must be the parsed form of `result.race_result`. `year_best` is
    /// the fastest of the runner's `current_year` results, the new one
    /// included. A current-year result still requires the cached season best
    /// to be readable. Returns whether either field changed.
    pub fn record(
        &mut self,
        result: &RaceResult,
        time: RaceTime,
        current_year: i32,
        year_best: Option<String>,
    ) -> Result<bool, CorruptBest> {
        let mut changed = improve(&mut self.personal_best, &result.race_result, time)
            .map_err(CorruptBest::PersonalBest)?;

        if result.year == current_year {
            if let Some(cached) = self.season_best.as_deref().filter(|s| !s.is_empty()) {
                RaceTime::parse(cached).map_err(CorruptBest::SeasonBest)?;
            }
        }

        changed |= self.settle_season(year_best);
        Ok(changed)
    }

    /// Whether `deleted` was backing the personal best.
    ///
    /// Matching is on the stored text. A tie with another result still
    /// triggers a recompute, which then finds the same value again.
    pub fn backed_by(&self, deleted: &RaceResult) -> bool {
        self.personal_best.as_deref() == Some(deleted.race_result.as_str())
    }

    /// Take the season best from this year's fastest result.
    ///
    /// Also drops a season best carried over from an earlier year.
    pub fn settle_season(&mut self, year_best: Option<String>) -> bool {
        let changed = self.season_best != year_best;
        self.season_best = year_best;
        changed
    }
}

/// Replace `slot` with `text` if it is empty or strictly slower than `time`.
fn improve(slot: &mut Option<String>, text: &str, time: RaceTime) -> Result<bool, RaceTimeError> {
    let wins = match slot.as_deref() {
        None | Some("") => true,
        Some(current) => time < RaceTime::parse(current)?,
    };
    if wins {
        *slot = Some(text.to_string());
    }
    Ok(wins)
}
