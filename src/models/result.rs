// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race result model for storage and API.

use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;
use crate::models::runner::first_violation;

/// A single race finish recorded against a runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(default)]
pub struct RaceResult {
    /// Store-assigned ID (empty until created)
    pub id: String,
    /// Owning runner
    #[validate(length(min = 1, message = "Invalid runner ID"))]
    pub runner_id: String,
    /// Finish time as `HH:MM:SS`
    #[validate(length(min = 1, message = "Invalid race results"))]
    pub race_result: String,
    #[validate(length(min = 1, message = "Invalid Location of result"))]
    pub location: String,
    #[validate(range(min = 0, message = "Invalid position in result."))]
    pub position: i32,
    pub year: i32,
}

const RESULT_FIELDS: [&str; 4] = ["runner_id", "race_result", "location", "position"];

impl RaceResult {
    /// Check the static field rules and that `year` lies in `0..=current_year`.
    pub fn check(&self, current_year: i32) -> Result<(), AppError> {
        self.validate()
            .map_err(|errors| first_violation(&errors, &RESULT_FIELDS))?;

        if !(0..=current_year).contains(&self.year) {
            return Err(AppError::BadRequest(
                "Invalid year for race result.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_result() -> RaceResult {
        RaceResult {
            runner_id: "r1".to_string(),
            race_result: "02:05:30".to_string(),
            location: "Berlin".to_string(),
            position: 3,
            year: 2024,
            ..Default::default()
        }
    }

    #[test]
    fn test_check_accepts_valid_result() {
        assert!(valid_result().check(2024).is_ok());
    }

    #[test]
    fn test_check_rejects_each_field() {
        let cases = [
            RaceResult {
                runner_id: String::new(),
                ..valid_result()
            },
            RaceResult {
                race_result: String::new(),
                ..valid_result()
            },
            RaceResult {
                location: String::new(),
                ..valid_result()
            },
            RaceResult {
                position: -1,
                ..valid_result()
            },
            RaceResult {
                year: -1,
                ..valid_result()
            },
            RaceResult {
                year: 2025,
                ..valid_result()
            },
        ];
        for result in cases {
            assert!(
                matches!(result.check(2024), Err(AppError::BadRequest(_))),
                "expected rejection for {result:?}"
            );
        }
    }

    #[test]
    fn test_position_zero_is_allowed() {
        let result = RaceResult {
            position: 0,
            year: 0,
            ..valid_result()
        };
        assert!(result.check(2024).is_ok());
    }
}
