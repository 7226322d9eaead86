// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process database.
//!
//! All tables sit behind a single async mutex. A unit of work holds that lock
//! until it commits or rolls back, so transactions are fully serialized and
//! plain reads never observe half-applied changes. Each change made through a
//! unit of work is recorded in an undo log that is replayed in reverse on
//! rollback (or when the unit of work is dropped unfinished).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{
    min_result, rank_by_personal_best, rank_by_year_best, Database, ResultStore, RunnerStore,
    UnitOfWork, UserStore,
};
use crate::error::{AppError, Result};
use crate::models::{BestTimes, RaceResult, Role, Runner, RunnerStatus, Session, User};

#[derive(Debug, Default)]
struct Tables {
    runners: BTreeMap<String, Runner>,
    results: BTreeMap<String, RaceResult>,
    users: BTreeMap<String, User>,
}

/// In-memory database shared by clones.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<Tables>>,
    fail_best_time_writes: Arc<AtomicBool>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `update_best_times` fail with a database error.
    ///
    /// Used to exercise rollback paths.
    pub fn inject_best_time_write_failure(&self, fail: bool) {
        self.fail_best_time_writes.store(fail, Ordering::SeqCst);
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
impl RunnerStore for MemoryDb {
    async fn create_runner(&self, runner: &Runner) -> Result<Runner> {
        let created = Runner {
            id: new_id(),
            status: RunnerStatus::Active,
            personal_best: None,
            season_best: None,
            results: None,
            ..runner.clone()
        };
        self.tables
            .lock()
            .await
            .runners
            .insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_runner(&self, runner: &Runner) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .runners
            .get_mut(&runner.id)
            .ok_or_else(|| AppError::NotFound("Runner not found".to_string()))?;

        stored.first_name = runner.first_name.clone();
        stored.last_name = runner.last_name.clone();
        stored.age = runner.age;
        stored.country = runner.country.clone();
        Ok(())
    }

    async fn deactivate_runner(&self, runner_id: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .runners
            .get_mut(runner_id)
            .ok_or_else(|| AppError::NotFound("Runner not found".to_string()))?;
        stored.status = RunnerStatus::Inactive;
        Ok(())
    }

    async fn get_runner(&self, runner_id: &str) -> Result<Option<Runner>> {
        Ok(self.tables.lock().await.runners.get(runner_id).cloned())
    }

    async fn list_runners(&self) -> Result<Vec<Runner>> {
        Ok(self.tables.lock().await.runners.values().cloned().collect())
    }

    async fn list_runners_by_country(&self, country: &str, limit: usize) -> Result<Vec<Runner>> {
        let tables = self.tables.lock().await;
        Ok(rank_by_personal_best(
            tables.runners.values().cloned(),
            country,
            limit,
        ))
    }

    async fn list_runners_by_year(&self, year: i32, limit: usize) -> Result<Vec<Runner>> {
        let tables = self.tables.lock().await;
        let year_results: Vec<RaceResult> = tables
            .results
            .values()
            .filter(|r| r.year == year)
            .cloned()
            .collect();
        Ok(rank_by_year_best(
            tables.runners.values().cloned(),
            &year_results,
            limit,
        ))
    }
}

#[async_trait]
impl ResultStore for MemoryDb {
    async fn get_result(&self, result_id: &str) -> Result<Option<RaceResult>> {
        Ok(self.tables.lock().await.results.get(result_id).cloned())
    }

    async fn list_results_for_runner(&self, runner_id: &str) -> Result<Vec<RaceResult>> {
        let tables = self.tables.lock().await;
        let mut results: Vec<RaceResult> = tables
            .results
            .values()
            .filter(|r| r.runner_id == runner_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.year.cmp(&a.year));
        Ok(results)
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.tables
            .lock()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn set_session(&self, user_id: &str, session: &Session) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        user.session = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self, access_token: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        for user in tables.users.values_mut() {
            if user
                .session
                .as_ref()
                .is_some_and(|s| s.access_token == access_token)
            {
                user.session = None;
            }
        }
        Ok(())
    }

    async fn role_for_token(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Role>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find_map(|u| u.role_for_token(access_token, now)))
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork {
            tables,
            undo: Vec::new(),
            fail_best_time_writes: self.fail_best_time_writes.load(Ordering::SeqCst),
            finished: false,
        }))
    }
}

/// A reversible change recorded by a unit of work.
#[derive(Debug)]
enum Change {
    InsertedResult { result_id: String },
    DeletedResult { row: RaceResult },
    UpdatedBests { runner_id: String, previous: BestTimes },
}

/// Unit of work holding the table lock until it finishes.
pub struct MemoryUnitOfWork {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Change>,
    fail_best_time_writes: bool,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn revert(&mut self) {
        while let Some(change) = self.undo.pop() {
            match change {
                Change::InsertedResult { result_id } => {
                    self.tables.results.remove(&result_id);
                }
                Change::DeletedResult { row } => {
                    self.tables.results.insert(row.id.clone(), row);
                }
                Change::UpdatedBests {
                    runner_id,
                    previous,
                } => {
                    if let Some(runner) = self.tables.runners.get_mut(&runner_id) {
                        runner.personal_best = previous.personal_best;
                        runner.season_best = previous.season_best;
                    }
                }
            }
        }
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.finished && !self.undo.is_empty() {
            tracing::warn!(
                changes = self.undo.len(),
                "Unit of work dropped without commit, rolling back"
            );
            self.revert();
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn create_result(&mut self, result: &RaceResult) -> Result<RaceResult> {
        let created = RaceResult {
            id: new_id(),
            ..result.clone()
        };
        self.tables
            .results
            .insert(created.id.clone(), created.clone());
        self.undo.push(Change::InsertedResult {
            result_id: created.id.clone(),
        });
        Ok(created)
    }

    async fn delete_result(&mut self, result_id: &str) -> Result<Option<RaceResult>> {
        let removed = self.tables.results.remove(result_id);
        if let Some(row) = &removed {
            self.undo.push(Change::DeletedResult { row: row.clone() });
        }
        Ok(removed)
    }

    async fn get_runner(&mut self, runner_id: &str) -> Result<Option<Runner>> {
        Ok(self.tables.runners.get(runner_id).cloned())
    }

    async fn min_result_for_runner(&mut self, runner_id: &str) -> Result<Option<String>> {
        Ok(min_result(self.tables.results.values(), runner_id, None))
    }

    async fn min_result_for_runner_in_year(
        &mut self,
        runner_id: &str,
        year: i32,
    ) -> Result<Option<String>> {
        Ok(min_result(self.tables.results.values(), runner_id, Some(year)))
    }

    async fn update_best_times(&mut self, runner_id: &str, bests: &BestTimes) -> Result<()> {
        if self.fail_best_time_writes {
            return Err(AppError::Database(
                "Injected failure writing best times".to_string(),
            ));
        }

        let runner = self
            .tables
            .runners
            .get_mut(runner_id)
            .ok_or_else(|| AppError::NotFound("Runner not found".to_string()))?;

        let previous = BestTimes::of(runner);
        runner.personal_best = bests.personal_best.clone();
        runner.season_best = bests.season_best.clone();

        self.undo.push(Change::UpdatedBests {
            runner_id: runner_id.to_string(),
            previous,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.finished = true;
        this.undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.revert();
        this.finished = true;
        Ok(())
    }
}
