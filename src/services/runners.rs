// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runner CRUD and leaderboard queries.

use std::sync::Arc;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::Runner;
use crate::time_utils::current_year;

/// Leaderboard size for the country and year queries.
pub const LEADERBOARD_LIMIT: usize = 10;

#[derive(Clone)]
pub struct RunnersService {
    db: Arc<dyn Database>,
}

fn require_id(runner_id: &str) -> Result<()> {
    if runner_id.is_empty() {
        return Err(AppError::BadRequest("Invalid runner ID".to_string()));
    }
    Ok(())
}

impl RunnersService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Store a new active runner. Best-time fields in the input are ignored.
    pub async fn create_runner(&self, runner: &Runner) -> Result<Runner> {
        runner.check()?;
        let created = self.db.create_runner(runner).await?;
        tracing::info!(runner_id = %created.id, country = %created.country, "Runner created");
        Ok(created)
    }

    pub async fn update_runner(&self, runner: &Runner) -> Result<()> {
        require_id(&runner.id)?;
        runner.check()?;
        self.db.update_runner(runner).await?;
        tracing::info!(runner_id = %runner.id, "Runner updated");
        Ok(())
    }

    pub async fn delete_runner(&self, runner_id: &str) -> Result<()> {
        require_id(runner_id)?;
        self.db.deactivate_runner(runner_id).await?;
        tracing::info!(runner_id, "Runner deactivated");
        Ok(())
    }

    /// Fetch a runner together with its results.
    pub async fn get_runner(&self, runner_id: &str) -> Result<Runner> {
        require_id(runner_id)?;
        let mut runner = self
            .db
            .get_runner(runner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Runner not found".to_string()))?;
        runner.results = Some(self.db.list_results_for_runner(runner_id).await?);
        Ok(runner)
    }

    /// List runners, optionally as a country or yearly leaderboard.
    ///
    /// Empty parameters count as absent. At most one may be given.
    pub async fn get_runners_batch(
        &self,
        country: Option<&str>,
        year: Option<&str>,
    ) -> Result<Vec<Runner>> {
        let country = country.filter(|c| !c.is_empty());
        let year = year.filter(|y| !y.is_empty());

        match (country, year) {
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "Only one parameter can be passed. Country or Year.".to_string(),
            )),
            (Some(country), None) => {
                self.db
                    .list_runners_by_country(country, LEADERBOARD_LIMIT)
                    .await
            }
            (None, Some(year)) => {
                let year = parse_year(year, current_year())?;
                self.db.list_runners_by_year(year, LEADERBOARD_LIMIT).await
            }
            (None, None) => self.db.list_runners().await,
        }
    }
}

fn parse_year(text: &str, current_year: i32) -> Result<i32> {
    text.parse::<i32>()
        .ok()
        .filter(|y| (0..=current_year).contains(y))
        .ok_or_else(|| AppError::BadRequest("Invalid year".to_string()))
}
