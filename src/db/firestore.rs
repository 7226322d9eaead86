// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Collections:
//! - `runners` (keyed by runner ID)
//! - `results` (keyed by result ID, `runner_id` field links to the runner)
//! - `users` (keyed by user ID, session embedded)
//!
//! Units of work buffer their writes, overlay them on reads, and apply them
//! in one Firestore transaction at commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::collections::BTreeSet;

use crate::db::{
    collections, min_result, rank_by_personal_best, rank_by_year_best, Database, ResultStore,
    RunnerStore, UnitOfWork, UserStore,
};
use crate::error::{AppError, Result};
use crate::models::{BestTimes, RaceResult, Role, Runner, RunnerStatus, Session, User};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn find_users_by_token(&self, access_token: &str) -> Result<Vec<User>> {
        let token = access_token.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("session.access_token").eq(token.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn write_user_session(&self, user: &User) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(["session"])
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

async fn fetch_runner(client: &firestore::FirestoreDb, runner_id: &str) -> Result<Option<Runner>> {
    client
        .fluent()
        .select()
        .by_id_in(collections::RUNNERS)
        .obj()
        .one(runner_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

async fn fetch_result(
    client: &firestore::FirestoreDb,
    result_id: &str,
) -> Result<Option<RaceResult>> {
    client
        .fluent()
        .select()
        .by_id_in(collections::RESULTS)
        .obj()
        .one(result_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

async fn fetch_results_for_runner(
    client: &firestore::FirestoreDb,
    runner_id: &str,
    year: Option<i32>,
) -> Result<Vec<RaceResult>> {
    let runner_id = runner_id.to_string();
    let query = client.fluent().select().from(collections::RESULTS);

    let query = if let Some(year) = year {
        query.filter(move |q| {
            q.for_all([
                q.field("runner_id").eq(runner_id.clone()),
                q.field("year").eq(year),
            ])
        })
    } else {
        query.filter(move |q| q.field("runner_id").eq(runner_id.clone()))
    };

    query
        .obj()
        .query()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

// ─── Runner Operations ───────────────────────────────────────

#[async_trait]
impl RunnerStore for FirestoreDb {
    async fn create_runner(&self, runner: &Runner) -> Result<Runner> {
        let created = Runner {
            id: new_id(),
            status: RunnerStatus::Active,
            personal_best: None,
            season_best: None,
            results: None,
            ..runner.clone()
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RUNNERS)
            .document_id(&created.id)
            .object(&created)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(runner_id = %created.id, "Runner stored");
        Ok(created)
    }

    async fn update_runner(&self, runner: &Runner) -> Result<()> {
        let client = self.get_client()?;
        let mut stored = fetch_runner(client, &runner.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Runner not found".to_string()))?;

        stored.first_name = runner.first_name.clone();
        stored.last_name = runner.last_name.clone();
        stored.age = runner.age;
        stored.country = runner.country.clone();

        let _: () = client
            .fluent()
            .update()
            .fields(["first_name", "last_name", "age", "country"])
            .in_col(collections::RUNNERS)
            .document_id(&stored.id)
            .object(&stored)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn deactivate_runner(&self, runner_id: &str) -> Result<()> {
        let client = self.get_client()?;
        let mut stored = fetch_runner(client, runner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Runner not found".to_string()))?;
        stored.status = RunnerStatus::Inactive;

        let _: () = client
            .fluent()
            .update()
            .fields(["is_active"])
            .in_col(collections::RUNNERS)
            .document_id(runner_id)
            .object(&stored)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_runner(&self, runner_id: &str) -> Result<Option<Runner>> {
        fetch_runner(self.get_client()?, runner_id).await
    }

    async fn list_runners(&self) -> Result<Vec<Runner>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RUNNERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Filtering happens server-side; ranking is done here so that runners
    /// without a personal best sort last, as in every other backend.
    async fn list_runners_by_country(&self, country: &str, limit: usize) -> Result<Vec<Runner>> {
        let country_owned = country.to_string();
        let runners: Vec<Runner> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::RUNNERS)
            .filter(move |q| {
                q.for_all([
                    q.field("country").eq(country_owned.clone()),
                    q.field("is_active").eq(true),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rank_by_personal_best(runners, country, limit))
    }

    async fn list_runners_by_year(&self, year: i32, limit: usize) -> Result<Vec<Runner>> {
        let client = self.get_client()?;

        let year_results: Vec<RaceResult> = client
            .fluent()
            .select()
            .from(collections::RESULTS)
            .filter(move |q| q.field("year").eq(year))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let runner_ids: BTreeSet<String> =
            year_results.iter().map(|r| r.runner_id.clone()).collect();

        let runners: Vec<Runner> = stream::iter(runner_ids)
            .map(|runner_id| async move { fetch_runner(client, &runner_id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Runner>>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<Runner>>>>()?
            .into_iter()
            .flatten()
            .collect();

        Ok(rank_by_year_best(runners, &year_results, limit))
    }
}

// ─── Result Operations ───────────────────────────────────────

#[async_trait]
impl ResultStore for FirestoreDb {
    async fn get_result(&self, result_id: &str) -> Result<Option<RaceResult>> {
        fetch_result(self.get_client()?, result_id).await
    }

    async fn list_results_for_runner(&self, runner_id: &str) -> Result<Vec<RaceResult>> {
        let mut results = fetch_results_for_runner(self.get_client()?, runner_id, None).await?;
        results.sort_by(|a, b| b.year.cmp(&a.year));
        Ok(results)
    }
}

// ─── User Operations ─────────────────────────────────────────

#[async_trait]
impl UserStore for FirestoreDb {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("username").eq(username.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    async fn set_session(&self, user_id: &str, session: &Session) -> Result<()> {
        let mut user: User = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        user.session = Some(session.clone());
        self.write_user_session(&user).await
    }

    async fn clear_session(&self, access_token: &str) -> Result<()> {
        for mut user in self.find_users_by_token(access_token).await? {
            user.session = None;
            self.write_user_session(&user).await?;
        }
        Ok(())
    }

    async fn role_for_token(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Role>> {
        Ok(self
            .find_users_by_token(access_token)
            .await?
            .iter()
            .find_map(|u| u.role_for_token(access_token, now)))
    }
}

#[async_trait]
impl Database for FirestoreDb {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(FirestoreUnitOfWork {
            client: self.get_client()?.clone(),
            writes: Vec::new(),
        }))
    }
}

// ─── Units of Work ───────────────────────────────────────────

#[derive(Debug)]
enum PendingWrite {
    PutResult(RaceResult),
    DeleteResult(String),
    PutBests { runner_id: String, bests: BestTimes },
}

/// Buffered unit of work; nothing reaches Firestore before `commit`.
pub struct FirestoreUnitOfWork {
    client: firestore::FirestoreDb,
    writes: Vec<PendingWrite>,
}

impl FirestoreUnitOfWork {
    fn is_deleted(&self, result_id: &str) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w, PendingWrite::DeleteResult(id) if id == result_id))
    }

    /// Results for a runner as they will look after commit.
    async fn visible_results(&self, runner_id: &str, year: Option<i32>) -> Result<Vec<RaceResult>> {
        let mut results: Vec<RaceResult> = fetch_results_for_runner(&self.client, runner_id, year)
            .await?
            .into_iter()
            .filter(|r| !self.is_deleted(&r.id))
            .collect();

        results.extend(self.writes.iter().filter_map(|w| match w {
            PendingWrite::PutResult(r) if r.runner_id == runner_id => Some(r.clone()),
            _ => None,
        }));
        Ok(results)
    }
}

#[async_trait]
impl UnitOfWork for FirestoreUnitOfWork {
    async fn create_result(&mut self, result: &RaceResult) -> Result<RaceResult> {
        let created = RaceResult {
            id: new_id(),
            ..result.clone()
        };
        self.writes.push(PendingWrite::PutResult(created.clone()));
        Ok(created)
    }

    async fn delete_result(&mut self, result_id: &str) -> Result<Option<RaceResult>> {
        if self.is_deleted(result_id) {
            return Ok(None);
        }

        let staged = self.writes.iter().position(
            |w| matches!(w, PendingWrite::PutResult(r) if r.id == result_id),
        );
        if let Some(index) = staged {
            if let PendingWrite::PutResult(row) = self.writes.remove(index) {
                return Ok(Some(row));
            }
        }

        let row = fetch_result(&self.client, result_id).await?;
        if row.is_some() {
            self.writes
                .push(PendingWrite::DeleteResult(result_id.to_string()));
        }
        Ok(row)
    }

    async fn get_runner(&mut self, runner_id: &str) -> Result<Option<Runner>> {
        let mut runner = fetch_runner(&self.client, runner_id).await?;

        if let Some(runner) = runner.as_mut() {
            let staged = self.writes.iter().rev().find_map(|w| match w {
                PendingWrite::PutBests {
                    runner_id: id,
                    bests,
                } if id == runner_id => Some(bests),
                _ => None,
            });
            if let Some(bests) = staged {
                runner.personal_best = bests.personal_best.clone();
                runner.season_best = bests.season_best.clone();
            }
        }
        Ok(runner)
    }

    async fn min_result_for_runner(&mut self, runner_id: &str) -> Result<Option<String>> {
        let results = self.visible_results(runner_id, None).await?;
        Ok(min_result(&results, runner_id, None))
    }

    async fn min_result_for_runner_in_year(
        &mut self,
        runner_id: &str,
        year: i32,
    ) -> Result<Option<String>> {
        let results = self.visible_results(runner_id, Some(year)).await?;
        Ok(min_result(&results, runner_id, Some(year)))
    }

    async fn update_best_times(&mut self, runner_id: &str, bests: &BestTimes) -> Result<()> {
        self.writes.push(PendingWrite::PutBests {
            runner_id: runner_id.to_string(),
            bests: bests.clone(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let client = &self.client;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for write in &self.writes {
            match write {
                PendingWrite::PutResult(result) => {
                    client
                        .fluent()
                        .update()
                        .in_col(collections::RESULTS)
                        .document_id(&result.id)
                        .object(result)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add result to transaction: {}",
                                e
                            ))
                        })?;
                }
                PendingWrite::DeleteResult(result_id) => {
                    client
                        .fluent()
                        .delete()
                        .from(collections::RESULTS)
                        .document_id(result_id)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add deletion to transaction: {}",
                                e
                            ))
                        })?;
                }
                PendingWrite::PutBests { runner_id, bests } => {
                    client
                        .fluent()
                        .update()
                        .fields(["personal_best", "season_best"])
                        .in_col(collections::RUNNERS)
                        .document_id(runner_id)
                        .object(bests)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add best times to transaction: {}",
                                e
                            ))
                        })?;
                }
            }
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(writes = self.writes.len(), "Unit of work committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!(
            discarded = self.writes.len(),
            "Unit of work rolled back"
        );
        Ok(())
    }
}
