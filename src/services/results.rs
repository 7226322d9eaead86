// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race result service.
//!
//! Creating or deleting a result keeps the owning runner's cached best times
//! in step with its results. Both paths run inside one unit of work:
//! 1. Write the result change
//! 2. Re-read the runner
//! 3. Fold in (create) or recompute (delete) the best times
//! 4. Write the best times and commit
//!
//! Any failure rolls the whole unit of work back, so a result is never left
//! behind without its runner's bests reflecting it, and a runner never points
//! at a best time that no longer exists among its results.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{Database, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{BestTimes, RaceResult, RaceTime};
use crate::time_utils::current_year;

/// Per-runner locks serializing reconciliation for the same runner.
pub type RunnerLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

#[derive(Clone)]
pub struct ResultsService {
    db: Arc<dyn Database>,
    runner_locks: RunnerLocks,
}

/// Holds one runner's lock. On drop the lock is released and the runner's
/// entry is removed unless another task still holds or awaits it.
struct RunnerGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    runner_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RunnerGuard<'_> {
    fn drop(&mut self) {
        // The guard owns our reference to the mutex; release it first.
        self.guard.take();
        self.locks
            .remove_if(&self.runner_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl ResultsService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            runner_locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock_runner(&self, runner_id: &str) -> RunnerGuard<'_> {
        let lock = self
            .runner_locks
            .entry(runner_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        RunnerGuard {
            locks: &self.runner_locks,
            runner_id: runner_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Validate and store a result, updating the runner's bests.
    pub async fn create_result(&self, result: &RaceResult) -> Result<RaceResult> {
        let year = current_year();
        result.check(year)?;

        let time = RaceTime::parse(&result.race_result).map_err(|e| {
            tracing::debug!(error = %e, "Rejecting unparseable race result");
            AppError::BadRequest("Invalid race result. Unable to parse.".to_string())
        })?;

        let _guard = self.lock_runner(&result.runner_id).await;

        let mut uow = self.db.begin().await?;
        match record_result(uow.as_mut(), result, time, year).await {
            Ok(created) => {
                uow.commit().await?;
                tracing::info!(
                    result_id = %created.id,
                    runner_id = %created.runner_id,
                    race_result = %created.race_result,
                    "Result created"
                );
                Ok(created)
            }
            Err(e) => {
                abandon(uow, &e).await;
                Err(e)
            }
        }
    }

    /// Delete a result and recompute any best time it was backing.
    pub async fn delete_result(&self, result_id: &str) -> Result<()> {
        if result_id.is_empty() {
            return Err(AppError::BadRequest("Invalid result ID".to_string()));
        }

        // Learn the owner first so the runner lock is held across the whole
        // unit of work.
        let existing = self
            .db
            .get_result(result_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

        let _guard = self.lock_runner(&existing.runner_id).await;

        let mut uow = self.db.begin().await?;
        match remove_result(uow.as_mut(), result_id, current_year()).await {
            Ok(deleted) => {
                uow.commit().await?;
                tracing::info!(
                    result_id,
                    runner_id = %deleted.runner_id,
                    "Result deleted"
                );
                Ok(())
            }
            Err(e) => {
                abandon(uow, &e).await;
                Err(e)
            }
        }
    }
}

async fn abandon(uow: Box<dyn UnitOfWork>, cause: &AppError) {
    tracing::warn!(error = %cause, "Rolling back unit of work");
    if let Err(e) = uow.rollback().await {
        tracing::error!(error = %e, "Rollback failed");
    }
}

fn corrupt(e: impl std::fmt::Display) -> AppError {
    AppError::Database(e.to_string())
}

async fn record_result(
    uow: &mut dyn UnitOfWork,
    result: &RaceResult,
    time: RaceTime,
    current_year: i32,
) -> Result<RaceResult> {
    let created = uow.create_result(result).await?;

    let runner = uow
        .get_runner(&created.runner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid runner not found.".to_string()))?;

    // Sees the new row, so a current-year result competes only with this year.
    let year_best = uow
        .min_result_for_runner_in_year(&runner.id, current_year)
        .await?;

    let mut bests = BestTimes::of(&runner);
    let improved = bests
        .record(&created, time, current_year, year_best)
        .map_err(corrupt)?;

    if improved {
        tracing::info!(
            runner_id = %runner.id,
            personal_best = ?bests.personal_best,
            season_best = ?bests.season_best,
            "Best times improved"
        );
    }

    uow.update_best_times(&runner.id, &bests).await?;
    Ok(created)
}

async fn remove_result(
    uow: &mut dyn UnitOfWork,
    result_id: &str,
    current_year: i32,
) -> Result<RaceResult> {
    let deleted = uow
        .delete_result(result_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    let runner = uow
        .get_runner(&deleted.runner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Runner not found".to_string()))?;

    let mut bests = BestTimes::of(&runner);
    let mut changed = false;

    if bests.backed_by(&deleted) {
        let personal_best = uow.min_result_for_runner(&runner.id).await?;
        changed = bests.personal_best != personal_best;
        bests.personal_best = personal_best;
    }

    let year_best = uow
        .min_result_for_runner_in_year(&runner.id, current_year)
        .await?;
    changed |= bests.settle_season(year_best);

    if changed {
        tracing::info!(
            runner_id = %runner.id,
            personal_best = ?bests.personal_best,
            season_best = ?bests.season_best,
            "Best times recomputed"
        );
    }

    uow.update_best_times(&runner.id, &bests).await?;
    Ok(deleted)
}
