//! Countdown state machine over the local store

use std::{sync::Arc, time::Duration};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    clock::Clock,
    error::EngineError,
    state::{TimerState, TimerStateStore, FIXED_DURATION},
};

/// A freshly armed countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownStarted {
    pub start: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// A countdown that was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownStopped {
    pub start: Option<DateTime<Utc>>,
    pub stop: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Start/stop/reset logic. Holds no state of its own; everything lives in the
/// [`TimerStateStore`].
#[derive(Clone)]
pub struct CountdownEngine {
    store: Arc<TimerStateStore>,
    clock: Arc<dyn Clock>,
}

impl CountdownEngine {
    pub fn new(store: Arc<TimerStateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<TimerStateStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Arm a new countdown ending `FIXED_DURATION` from now
    pub fn start_countdown(&self) -> Result<CountdownStarted, EngineError> {
        if self.store.is_counting() {
            return Err(EngineError::AlreadyRunning);
        }

        let start = self.clock.now();
        let deadline = start + chrono::Duration::seconds(FIXED_DURATION.as_secs() as i64);
        self.store.replace(TimerState::counting(start, deadline))?;

        info!("Countdown started at {}, deadline {}", start, deadline);
        Ok(CountdownStarted { start, deadline })
    }

    /// Stop the running countdown and report how long it ran
    pub fn stop_countdown(&self) -> Result<CountdownStopped, EngineError> {
        let state = self.store.snapshot();
        if !state.counting {
            return Err(EngineError::NotRunning);
        }

        let stop = self.clock.now();
        let elapsed = state
            .start
            .and_then(|start| (stop - start).to_std().ok())
            .unwrap_or(Duration::ZERO);

        self.store.replace(TimerState::idle())?;

        info!("Countdown stopped after {}s", elapsed.as_secs());
        Ok(CountdownStopped {
            start: state.start,
            stop,
            elapsed,
        })
    }

    /// Discard the running countdown, if any
    pub fn reset_timer(&self) -> Result<(), EngineError> {
        if self.store.snapshot() == TimerState::idle() {
            debug!("Reset requested while idle, nothing to clear");
            return Ok(());
        }

        self.store.replace(TimerState::idle())?;
        info!("Countdown reset");
        Ok(())
    }

    pub fn is_counting(&self) -> bool {
        self.store.is_counting()
    }

    pub fn remaining_time(&self) -> Duration {
        self.store.remaining_time(self.clock.now())
    }

    pub fn elapsed(&self) -> Duration {
        self.store.snapshot().elapsed(self.clock.now())
    }
}
