//! Persisted countdown record and its on-disk encoding

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Length of every countdown.
pub const FIXED_DURATION: Duration = Duration::from_secs(6 * 60 * 60);

/// Timestamp pattern used for the persisted start and deadline (`MM/dd/yyyy HH:mm:ss`).
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

const START_KEY: &str = "startKey";
const STOP_KEY: &str = "stopKey";
const COUNTING_KEY: &str = "countingKey";

/// Local countdown state: start time, deadline and the running flag.
///
/// `counting` is only true when both timestamps are present and the deadline
/// lies after the start. The three fields always change together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    pub start: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub counting: bool,
}

impl TimerState {
    /// Nothing running, nothing recorded
    pub fn idle() -> Self {
        Self::default()
    }

    /// A countdown armed at `start` that expires at `deadline`
    pub fn counting(start: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            deadline: Some(deadline),
            counting: true,
        }
    }

    /// Check the running flag against the timestamps
    pub fn is_consistent(&self) -> bool {
        match (self.counting, self.start, self.deadline) {
            (true, Some(start), Some(deadline)) => deadline > start,
            (true, _, _) => false,
            (false, start, deadline) => start.is_none() && deadline.is_none(),
        }
    }

    /// Time left until the deadline, zero once expired or when idle
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        match (self.counting, self.deadline) {
            (true, Some(deadline)) => (deadline - now).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Time since the countdown started, zero when idle
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match (self.counting, self.start) {
            (true, Some(start)) => (now - start).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Whether the deadline has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!((self.counting, self.deadline), (true, Some(deadline)) if now >= deadline)
    }

    /// Encode as the JSON document written to disk
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(Serialize)]
        struct Stored {
            #[serde(rename = "startKey")]
            start: Option<String>,
            #[serde(rename = "stopKey")]
            stop: Option<String>,
            #[serde(rename = "countingKey")]
            counting: bool,
        }

        serde_json::to_string_pretty(&Stored {
            start: self.start.map(format_timestamp),
            stop: self.deadline.map(format_timestamp),
            counting: self.counting,
        })
    }

    /// Decode a stored document leniently.
    ///
    /// Any field that is missing, of the wrong type or not in
    /// [`TIMESTAMP_FORMAT`] is treated as absent (`false` for the flag).
    pub fn from_json_lenient(document: &str) -> Self {
        let value: Value = match serde_json::from_str(document) {
            Ok(value) => value,
            Err(_) => return Self::idle(),
        };

        Self {
            start: value.get(START_KEY).and_then(Value::as_str).and_then(parse_timestamp),
            deadline: value.get(STOP_KEY).and_then(Value::as_str).and_then(parse_timestamp),
            counting: value.get(COUNTING_KEY).and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

/// Format a timestamp the way the state file stores it
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp, `None` when malformed
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
