//! Countdown module
//! 
//! This module contains the countdown state machine and the controller that
//! combines it with the ticker and the remote timer history.

pub mod controller;
pub mod engine;

// Re-export main types
pub use controller::{StopReport, TimerController};
pub use engine::{CountdownEngine, CountdownStarted, CountdownStopped};
