//! State management module
//! 
//! This module contains the persisted countdown record, its durable store and
//! the shared state handed to the HTTP handlers.

pub mod app_state;
pub mod store;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use store::TimerStateStore;
pub use timer_state::{format_timestamp, parse_timestamp, TimerState, FIXED_DURATION, TIMESTAMP_FORMAT};
