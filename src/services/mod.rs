//! Remote timer history services
//! 
//! This module contains the repository interface for the per-user timer
//! aggregate and its REST and in-memory implementations.

pub mod history;
pub mod memory;
pub mod rest;

// Re-export main types
pub use history::{fold_average, TimerHistoryRepository, TimerRecord, TimerStatus};
pub use memory::InMemoryTimerHistoryRepository;
pub use rest::RestTimerHistoryRepository;
