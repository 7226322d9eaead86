//! Database layer.
//!
//! Stores are expressed as traits so the service runs against either the
//! in-process [`MemoryDb`] or [`FirestoreDb`]. Multi-record writes go through
//! a [`UnitOfWork`], which is committed or rolled back as a whole.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::race_time::fastest;
use crate::models::{BestTimes, RaceResult, RaceTime, Role, Runner, Session, User};

/// Collection names as constants.
pub mod collections {
    pub const RUNNERS: &str = "runners";
    pub const RESULTS: &str = "results";
    pub const USERS: &str = "users";
}

/// Runner records.
#[async_trait]
pub trait RunnerStore: Send + Sync {
    /// Insert a new active runner with empty bests; returns it with its ID.
    async fn create_runner(&self, runner: &Runner) -> Result<Runner>;

    /// Overwrite the demographic fields. `NotFound` if the ID is unknown.
    async fn update_runner(&self, runner: &Runner) -> Result<()>;

    /// Soft delete. `NotFound` if the ID is unknown.
    async fn deactivate_runner(&self, runner_id: &str) -> Result<()>;

    async fn get_runner(&self, runner_id: &str) -> Result<Option<Runner>>;

    async fn list_runners(&self) -> Result<Vec<Runner>>;

    /// Fastest active runners of a country by personal best.
    async fn list_runners_by_country(&self, country: &str, limit: usize) -> Result<Vec<Runner>>;

    /// Fastest runners in `year`, with `season_best` set to that year's best.
    async fn list_runners_by_year(&self, year: i32, limit: usize) -> Result<Vec<Runner>>;
}

/// Read-only result queries. Writes go through [`UnitOfWork`].
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get_result(&self, result_id: &str) -> Result<Option<RaceResult>>;

    async fn list_results_for_runner(&self, runner_id: &str) -> Result<Vec<RaceResult>>;
}

/// Login accounts and their sessions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn upsert_user(&self, user: &User) -> Result<()>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Replace the user's session.
    async fn set_session(&self, user_id: &str, session: &Session) -> Result<()>;

    /// Drop whichever session holds `access_token`. Unknown tokens are ignored.
    async fn clear_session(&self, access_token: &str) -> Result<()>;

    /// Role for a token that exists and has not expired at `now`.
    async fn role_for_token(&self, access_token: &str, now: DateTime<Utc>)
        -> Result<Option<Role>>;
}

/// A complete backend: all stores plus transactional units of work.
#[async_trait]
pub trait Database: RunnerStore + ResultStore + UserStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// Transaction handle spanning the runner and result stores.
///
/// Dropping an unfinished unit of work discards its changes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert a result; the store assigns its ID.
    async fn create_result(&mut self, result: &RaceResult) -> Result<RaceResult>;

    /// Remove a result, returning the row as it was.
    async fn delete_result(&mut self, result_id: &str) -> Result<Option<RaceResult>>;

    async fn get_runner(&mut self, runner_id: &str) -> Result<Option<Runner>>;

    /// Fastest race time among the runner's results, as seen by this unit of work.
    async fn min_result_for_runner(&mut self, runner_id: &str) -> Result<Option<String>>;

    async fn min_result_for_runner_in_year(
        &mut self,
        runner_id: &str,
        year: i32,
    ) -> Result<Option<String>>;

    /// Write both cached best-time fields.
    async fn update_best_times(&mut self, runner_id: &str, bests: &BestTimes) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Sort key putting missing or unparseable times after every real time.
fn time_key(text: Option<&str>) -> (bool, Option<RaceTime>) {
    match text.map(RaceTime::parse) {
        Some(Ok(time)) => (false, Some(time)),
        _ => (true, None),
    }
}

/// Keep the `limit` active runners of `country` with the fastest personal best.
pub(crate) fn rank_by_personal_best<I>(runners: I, country: &str, limit: usize) -> Vec<Runner>
where
    I: IntoIterator<Item = Runner>,
{
    let mut ranked: Vec<Runner> = runners
        .into_iter()
        .filter(|r| r.country == country && r.status.is_active())
        .collect();
    ranked.sort_by_key(|r| time_key(r.personal_best.as_deref()));
    ranked.truncate(limit);
    ranked
}

/// Join each runner with its fastest result from `year_results` and keep the
/// `limit` fastest. Runners without a result that year are left out.
pub(crate) fn rank_by_year_best<I>(
    runners: I,
    year_results: &[RaceResult],
    limit: usize,
) -> Vec<Runner>
where
    I: IntoIterator<Item = Runner>,
{
    let mut by_runner: HashMap<&str, Vec<&str>> = HashMap::new();
    for result in year_results {
        by_runner
            .entry(result.runner_id.as_str())
            .or_default()
            .push(result.race_result.as_str());
    }

    let mut ranked: Vec<Runner> = runners
        .into_iter()
        .filter_map(|mut runner| {
            let times = by_runner.get(runner.id.as_str())?;
            runner.season_best = Some(fastest(times.iter().copied())?);
            Some(runner)
        })
        .collect();
    ranked.sort_by_key(|r| time_key(r.season_best.as_deref()));
    ranked.truncate(limit);
    ranked
}

/// Fastest race time among `results` owned by `runner_id`, optionally in `year`.
pub(crate) fn min_result<'a, I>(results: I, runner_id: &str, year: Option<i32>) -> Option<String>
where
    I: IntoIterator<Item = &'a RaceResult>,
{
    fastest(
        results
            .into_iter()
            .filter(|r| r.runner_id == runner_id && year.map_or(true, |y| r.year == y))
            .map(|r| r.race_result.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunnerStatus;

    fn runner(id: &str, country: &str, pb: Option<&str>) -> Runner {
        Runner {
            id: id.to_string(),
            first_name: id.to_string(),
            last_name: "Test".to_string(),
            age: 30,
            country: country.to_string(),
            personal_best: pb.map(String::from),
            ..Default::default()
        }
    }

    fn result(runner_id: &str, race_result: &str, year: i32) -> RaceResult {
        RaceResult {
            id: format!("{runner_id}-{race_result}"),
            runner_id: runner_id.to_string(),
            race_result: race_result.to_string(),
            location: "Oslo".to_string(),
            position: 1,
            year,
        }
    }

    #[test]
    fn test_rank_by_personal_best() {
        let mut inactive = runner("d", "Canada", Some("01:00:00"));
        inactive.status = RunnerStatus::Inactive;
        let runners = vec![
            runner("a", "Canada", Some("02:10:00")),
            runner("b", "Canada", None),
            runner("c", "Canada", Some("02:01:00")),
            inactive,
            runner("e", "Serbia", Some("01:30:00")),
        ];

        let ids: Vec<String> = rank_by_personal_best(runners.clone(), "Canada", 10)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["c", "a", "b"]);

        assert_eq!(rank_by_personal_best(runners, "Canada", 1).len(), 1);
    }

    #[test]
    fn test_rank_by_year_best() {
        let runners = vec![
            runner("a", "Canada", None),
            runner("b", "Serbia", None),
            runner("c", "Kenya", None),
        ];
        let results = vec![
            result("a", "02:30:00", 2023),
            result("a", "02:20:00", 2023),
            result("b", "02:10:00", 2023),
        ];

        let ranked = rank_by_year_best(runners, &results, 10);
        let summary: Vec<(&str, Option<&str>)> = ranked
            .iter()
            .map(|r| (r.id.as_str(), r.season_best.as_deref()))
            .collect();
        assert_eq!(
            summary,
            [("b", Some("02:10:00")), ("a", Some("02:20:00"))]
        );
    }

    #[test]
    fn test_min_result_filters_by_runner_and_year() {
        let results = vec![
            result("a", "02:30:00", 2023),
            result("a", "02:20:00", 2022),
            result("b", "01:10:00", 2023),
        ];
        assert_eq!(min_result(&results, "a", None).as_deref(), Some("02:20:00"));
        assert_eq!(
            min_result(&results, "a", Some(2023)).as_deref(),
            Some("02:30:00")
        );
        assert_eq!(min_result(&results, "a", Some(2021)), None);
        assert_eq!(min_result(&results, "z", None), None);
    }
}
