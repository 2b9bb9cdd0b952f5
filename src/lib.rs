//! Care Timer - a crash-safe reminder countdown for menstrual product changes
//! 
//! A countdown runs for a fixed six hours. Its start and deadline are persisted
//! locally so it survives process death, a ticker drives the live display while
//! it runs, and each completed countdown is folded into a per-user aggregate
//! (count and average duration) kept by a remote backend.

pub mod api;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use countdown::{CountdownEngine, StopReport, TimerController};
pub use error::{ControllerError, EngineError, RepositoryError, StoreError};
pub use services::{
    InMemoryTimerHistoryRepository, RestTimerHistoryRepository, TimerHistoryRepository, TimerRecord,
    TimerStatus,
};
pub use state::{AppState, TimerState, TimerStateStore, FIXED_DURATION};
pub use utils::signals::shutdown_signal;
