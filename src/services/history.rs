//! Remote timer history: the per-user aggregate record and its repository trait

use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;

/// Status column of the remote record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerStatus {
    Running,
    Stopped,
}

/// One row per user holding the running average of completed countdowns.
///
/// `average_time` only carries meaning when `timer_count > 0`. Both are
/// recomputed through [`TimerRecord::with_completion`], never edited directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub uid: String,
    pub status: TimerStatus,
    #[serde(with = "duration_ms")]
    pub average_time: Duration,
    pub timer_count: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimerRecord {
    /// Fold one more completed countdown into `previous` (or start a fresh
    /// aggregate when there is none).
    pub fn with_completion(
        previous: Option<&TimerRecord>,
        uid: &str,
        elapsed: Duration,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let (old_average, old_count) = previous
            .map(|record| (record.average_time, record.timer_count))
            .unwrap_or((Duration::ZERO, 0));
        let (average_time, timer_count) = fold_average(old_average, old_count, elapsed);

        Self {
            uid: uid.to_string(),
            status: TimerStatus::Stopped,
            average_time,
            timer_count,
            started_at,
            updated_at: now,
        }
    }
}

/// `((average * count) + elapsed) / (count + 1)` on whole milliseconds
pub fn fold_average(average: Duration, count: u64, elapsed: Duration) -> (Duration, u64) {
    let new_count = count.saturating_add(1);
    let total_ms = average.as_millis() * u128::from(count) + elapsed.as_millis();
    let average_ms = total_ms / u128::from(new_count);
    (Duration::from_millis(u64::try_from(average_ms).unwrap_or(u64::MAX)), new_count)
}

/// Remote persistence of [`TimerRecord`]s. No retries at this layer.
#[async_trait]
pub trait TimerHistoryRepository: Send + Sync {
    async fn get_timer(&self, uid: &str) -> Result<TimerRecord, RepositoryError>;

    /// Create or replace the row keyed by `record.uid`
    async fn upsert_timer(&self, record: &TimerRecord) -> Result<TimerRecord, RepositoryError>;

    async fn get_timers_of_user(&self, uid: &str) -> Result<Vec<TimerRecord>, RepositoryError>;

    /// Account cleanup only; the countdown flow never deletes
    async fn delete_timer(&self, uid: &str) -> Result<(), RepositoryError>;
}

/// `averageTime` travels as a number of milliseconds
mod duration_ms {
    use std::time::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        if !millis.is_finite() || millis < 0.0 {
            return Err(D::Error::custom(format!("invalid averageTime: {millis}")));
        }
        Ok(Duration::from_millis(millis.round() as u64))
    }
}
