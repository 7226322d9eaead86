// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runner model for storage and API.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;
use crate::models::RaceResult;

/// Whether a runner is still listed.
///
/// Deleting a runner only flips it to `Inactive`; results are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunnerStatus {
    #[default]
    Active,
    Inactive,
}

impl RunnerStatus {
    pub fn is_active(self) -> bool {
        self == RunnerStatus::Active
    }
}

impl From<bool> for RunnerStatus {
    fn from(active: bool) -> Self {
        if active {
            RunnerStatus::Active
        } else {
            RunnerStatus::Inactive
        }
    }
}

/// Serde adapter keeping the `is_active` boolean on the wire.
mod active_flag {
    use super::RunnerStatus;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &RunnerStatus, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(status.is_active())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RunnerStatus, D::Error> {
        bool::deserialize(d).map(RunnerStatus::from)
    }
}

/// Runner record.
///
/// `personal_best` and `season_best` are cached race times maintained by the
/// results service. Values supplied by clients are ignored on write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(default)]
pub struct Runner {
    /// Store-assigned ID (empty until created)
    pub id: String,
    #[validate(length(min = 1, message = "Invalid first name"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Invalid last name"))]
    pub last_name: String,
    #[validate(range(
        exclusive_min = 5,
        max = 125,
        message = "Invalid age range. Must be between 5 - 125"
    ))]
    pub age: i32,
    #[serde(rename = "is_active", with = "active_flag")]
    #[cfg_attr(feature = "binding-generation", ts(type = "boolean"))]
    pub status: RunnerStatus,
    #[validate(length(min = 1, message = "Invalid Country"))]
    pub country: String,
    pub personal_best: Option<String>,
    pub season_best: Option<String>,
    /// Populated only on detail fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RaceResult>>,
}

/// Field order used to pick which violation to report.
const RUNNER_FIELDS: [&str; 4] = ["first_name", "last_name", "age", "country"];

impl Runner {
    /// Check the client-editable fields.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|errors| first_violation(&errors, &RUNNER_FIELDS))
    }
}

/// Turn validator output into a `BadRequest` carrying the first failing
/// field's message, in declaration order.
pub(crate) fn first_violation(errors: &ValidationErrors, order: &[&str]) -> AppError {
    let field_errors = errors.field_errors();
    let message = order
        .iter()
        .find_map(|field| field_errors.get(*field))
        .and_then(|errs| errs.first())
        .and_then(|err| err.message.as_ref())
        .map(|m| m.to_string())
        .unwrap_or_else(|| "Invalid request".to_string());
    AppError::BadRequest(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_runner() -> Runner {
        Runner {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            age: 30,
            country: "Canada".to_string(),
            ..Default::default()
        }
    }

    fn message(runner: &Runner) -> Option<String> {
        match runner.check() {
            Ok(()) => None,
            Err(AppError::BadRequest(msg)) => Some(msg),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_runner() {
        let cases = [
            (
                "missing first name",
                Runner {
                    first_name: String::new(),
                    ..valid_runner()
                },
                Some("Invalid first name"),
            ),
            (
                "missing last name",
                Runner {
                    last_name: String::new(),
                    ..valid_runner()
                },
                Some("Invalid last name"),
            ),
            (
                "age too high",
                Runner {
                    age: 5000,
                    ..valid_runner()
                },
                Some("Invalid age range. Must be between 5 - 125"),
            ),
            (
                "missing country",
                Runner {
                    country: String::new(),
                    ..valid_runner()
                },
                Some("Invalid Country"),
            ),
            ("valid", valid_runner(), None),
        ];

        for (name, runner, want) in cases {
            assert_eq!(message(&runner).as_deref(), want, "case: {name}");
        }
    }

    #[test]
    fn test_age_bounds() {
        for (age, ok) in [(5, false), (6, true), (125, true), (126, false), (-1, false)] {
            let runner = Runner {
                age,
                ..valid_runner()
            };
            assert_eq!(runner.check().is_ok(), ok, "age {age}");
        }
    }

    #[test]
    fn test_first_violation_follows_field_order() {
        let runner = Runner {
            first_name: String::new(),
            country: String::new(),
            ..valid_runner()
        };
        assert_eq!(message(&runner).as_deref(), Some("Invalid first name"));
    }

    #[test]
    fn test_is_active_wire_format() {
        let runner = Runner {
            id: "r1".to_string(),
            status: RunnerStatus::Inactive,
            ..valid_runner()
        };
        let json = serde_json::to_value(&runner).unwrap();
        assert_eq!(json["is_active"], serde_json::json!(false));
        assert!(json.get("results").is_none());

        let parsed: Runner = serde_json::from_value(serde_json::json!({
            "first_name": "Maria",
            "last_name": "Dove",
            "age": 30,
            "country": "Serbia"
        }))
        .unwrap();
        assert_eq!(parsed.status, RunnerStatus::Active);
        assert!(parsed.personal_best.is_none());
    }
}
