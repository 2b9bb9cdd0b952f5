//! Live countdown ticker background task

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use chrono::{DateTime, Utc};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{clock::Clock, state::TimerStateStore};

/// Default tick period
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// One display update, computed from the persisted timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub at: DateTime<Utc>,
    pub elapsed: Duration,
    pub remaining: Duration,
    pub expired: bool,
}

/// Receiver of ticks. Errors and panics are contained to the tick that raised them.
pub trait TickSink: Send + Sync {
    fn on_tick(&self, tick: &Tick) -> anyhow::Result<()>;
}

/// Publishes the latest tick on a watch channel
#[derive(Debug, Clone)]
pub struct WatchSink {
    tx: watch::Sender<Option<Tick>>,
}

impl WatchSink {
    pub fn new(tx: watch::Sender<Option<Tick>>) -> Self {
        Self { tx }
    }
}

impl TickSink for WatchSink {
    fn on_tick(&self, tick: &Tick) -> anyhow::Result<()> {
        self.tx.send_replace(Some(*tick));
        Ok(())
    }
}

/// Low-importance notification channel: logs the elapsed time while counting
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TickSink for LogSink {
    fn on_tick(&self, tick: &Tick) -> anyhow::Result<()> {
        debug!(
            elapsed_secs = tick.elapsed.as_secs(),
            remaining_secs = tick.remaining.as_secs(),
            "Countdown running"
        );
        Ok(())
    }
}

/// Handle to a running ticker task.
///
/// The task ends when [`Ticker::stop`] is called, when the handle is dropped, or
/// when the store reports that no countdown is active.
#[derive(Debug)]
pub struct Ticker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a ticker reading `store` every `period`
    pub fn spawn(
        store: Arc<TimerStateStore>,
        clock: Arc<dyn Clock>,
        period: Duration,
        sinks: Vec<Arc<dyn TickSink>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(ticker_task(store, clock, period, sinks, cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel the task and wait for it, so no tick is delivered after this returns
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Ticker task ended abnormally: {}", e);
            }
        }
    }

    /// Whether the task has already exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn ticker_task(
    store: Arc<TimerStateStore>,
    clock: Arc<dyn Clock>,
    period: Duration,
    sinks: Vec<Arc<dyn TickSink>>,
    cancel: CancellationToken,
) {
    debug!("Starting countdown ticker every {:?}", period);

    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut expiry_announced = false;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Countdown ticker cancelled");
                break;
            }

            _ = ticker.tick() => {
                // Always recompute from the stored timestamps so a suspended
                // or restarted host shows the right value.
                let state = store.snapshot();
                if !state.counting {
                    debug!("No countdown active, ticker exiting");
                    break;
                }

                let now = clock.now();
                let tick = Tick {
                    at: now,
                    elapsed: state.elapsed(now),
                    remaining: state.remaining(now),
                    expired: state.is_expired(now),
                };

                if tick.expired && !expiry_announced {
                    info!("Countdown reached its deadline after {}s", tick.elapsed.as_secs());
                    expiry_announced = true;
                }

                for sink in &sinks {
                    deliver(sink.as_ref(), &tick);
                }
            }
        }
    }
}

fn deliver(sink: &dyn TickSink, tick: &Tick) {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.on_tick(tick))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("Tick sink failed: {:#}", err),
        Err(payload) => {
            let message = if let Some(message) = payload.downcast_ref::<&str>() {
                (*message).to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic payload".to_string()
            };
            error!("Tick sink panicked: {}", message);
        }
    }
}
