//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{services::TimerRecord, tasks::Tick};

/// Response for start and reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub counting: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub remaining_seconds: u64,
}

impl TimerResponse {
    /// A countdown is running
    pub fn counting(message: String, deadline: Option<DateTime<Utc>>, remaining_seconds: u64) -> Self {
        Self {
            status: "counting".to_string(),
            message,
            timestamp: Utc::now(),
            counting: true,
            deadline,
            remaining_seconds,
        }
    }

    /// Nothing is running
    pub fn idle(message: String) -> Self {
        Self {
            status: "idle".to_string(),
            message,
            timestamp: Utc::now(),
            counting: false,
            deadline: None,
            remaining_seconds: 0,
        }
    }
}

/// Response for stop: the elapsed time and what happened to the aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub aggregate: Option<TimerRecord>,
    pub sync_error: Option<String>,
}

/// Latest tick as shown to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickView {
    pub at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    pub expired: bool,
}

impl From<Tick> for TickView {
    fn from(tick: Tick) -> Self {
        Self {
            at: tick.at,
            elapsed_seconds: tick.elapsed.as_secs(),
            remaining_seconds: tick.remaining.as_secs(),
            expired: tick.expired,
        }
    }
}

/// Status response with countdown and server information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub uid: String,
    pub counting: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    pub remaining: String,
    pub last_tick: Option<TickView>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// History listing for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub uid: String,
    pub records: Vec<TimerRecord>,
}

/// Body returned with every non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
