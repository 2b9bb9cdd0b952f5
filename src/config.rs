//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::tasks::TICK_INTERVAL;

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "care-timer")]
#[command(about = "Crash-safe six hour reminder countdown with a remotely synced usage aggregate")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// File holding the persisted countdown
    #[arg(long, default_value = "care-timer-state.json")]
    pub state_file: PathBuf,

    /// User whose aggregate is kept up to date
    #[arg(short, long, env = "CARE_TIMER_UID")]
    pub uid: String,

    /// Base URL of the timer history REST backend; in-memory history when absent
    #[arg(long, env = "CARE_TIMER_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// API key sent to the backend
    #[arg(long, env = "CARE_TIMER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Timeout for backend requests in seconds
    #[arg(long)]
    pub backend_timeout_secs: Option<u64>,

    /// Display tick period in milliseconds
    #[arg(long, default_value_t = TICK_INTERVAL.as_millis() as u64)]
    pub tick_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Tick period, never shorter than 10ms
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(10))
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_secs.map(Duration::from_secs)
    }
}
