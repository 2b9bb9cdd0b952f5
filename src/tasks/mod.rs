//! Background tasks module
//! 
//! This module contains the countdown ticker that drives the live display
//! while a countdown is running.

pub mod ticker;

// Re-export main types
pub use ticker::{LogSink, Tick, TickSink, Ticker, WatchSink, TICK_INTERVAL};
