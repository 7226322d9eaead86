// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race time codec.
//!
//! Race times travel and are stored as fixed-width `HH:MM:SS` text. They are
//! only ever compared after parsing, never re-formatted from the parsed value.

use std::fmt;
use std::str::FromStr;

/// Errors produced when decoding a race time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaceTimeError {
    #[error("Invalid race time format: {0:?} (expected HH:MM:SS)")]
    InvalidFormat(String),
}

/// A parsed race time, totally ordered by elapsed seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RaceTime {
    seconds: u32,
}

impl RaceTime {
    /// Parse a race time in strict `HH:MM:SS` form.
    ///
    /// Each field is exactly two ASCII digits. Minutes and seconds are not
    /// range-checked; `00:75:00` is accepted and sorts after `01:00:00`.
    pub fn parse(text: &str) -> Result<Self, RaceTimeError> {
        let invalid = || RaceTimeError::InvalidFormat(text.to_string());

        let bytes = text.as_bytes();
        if bytes.len() != 8 || bytes[2] != b':' || bytes[5] != b':' {
            return Err(invalid());
        }

        let field = |at: usize| -> Result<u32, RaceTimeError> {
            let (hi, lo) = (bytes[at], bytes[at + 1]);
            if !hi.is_ascii_digit() || !lo.is_ascii_digit() {
                return Err(invalid());
            }
            Ok(u32::from(hi - b'0') * 10 + u32::from(lo - b'0'))
        };

        let hours = field(0)?;
        let minutes = field(3)?;
        let seconds = field(6)?;

        Ok(Self {
            seconds: hours * 3600 + minutes * 60 + seconds,
        })
    }

    /// Total elapsed seconds.
    pub fn as_secs(&self) -> u32 {
        self.seconds
    }
}

impl FromStr for RaceTime {
    type Err = RaceTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RaceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.seconds / 3600,
            (self.seconds % 3600) / 60,
            self.seconds % 60
        )
    }
}

/// Pick the fastest of a set of stored race-time strings.
///
/// Unparseable values are skipped with a warning; they can never be a best.
pub fn fastest<'a, I>(times: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    times
        .into_iter()
        .filter_map(|text| match RaceTime::parse(text) {
            Ok(time) => Some((time, text)),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparseable stored race time");
                None
            }
        })
        .min_by_key(|(time, _)| *time)
        .map(|(_, text)| text.to_string())
}
