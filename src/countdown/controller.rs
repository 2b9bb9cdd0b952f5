//! Timer controller: the surface the app layer talks to

use std::{sync::Arc, time::Duration};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    error::{ControllerError, RepositoryError},
    services::{TimerHistoryRepository, TimerRecord},
    state::{TimerState, TimerStateStore},
    tasks::{LogSink, Tick, TickSink, Ticker, WatchSink},
};
use super::engine::{CountdownEngine, CountdownStarted, CountdownStopped};

/// Outcome of stopping a countdown.
///
/// `elapsed` is always reported. `aggregate` holds the upserted record, or the
/// remote error when the sync failed; in that case the countdown's contribution
/// to the aggregate is lost because local state is already cleared.
#[derive(Debug, Clone)]
pub struct StopReport {
    pub elapsed: Duration,
    pub aggregate: Result<TimerRecord, RepositoryError>,
}

/// Coordinates the engine, the ticker and the remote history for one user.
pub struct TimerController {
    engine: CountdownEngine,
    repository: Arc<dyn TimerHistoryRepository>,
    uid: String,
    tick_interval: Duration,
    /// Running ticker, if any. Also serializes start/stop/reset.
    ticker: Mutex<Option<Ticker>>,
    /// Held across the remote get and upsert so completions are never folded twice
    aggregate_sync: Mutex<()>,
    tick_tx: watch::Sender<Option<Tick>>,
}

impl TimerController {
    pub fn new(
        store: Arc<TimerStateStore>,
        repository: Arc<dyn TimerHistoryRepository>,
        clock: Arc<dyn Clock>,
        uid: impl Into<String>,
        tick_interval: Duration,
    ) -> Self {
        let (tick_tx, _) = watch::channel(None);
        Self {
            engine: CountdownEngine::new(store, clock),
            repository,
            uid: uid.into(),
            tick_interval,
            ticker: Mutex::new(None),
            aggregate_sync: Mutex::new(()),
            tick_tx,
        }
    }

    /// User whose aggregate this controller maintains
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Start a countdown and its ticker
    pub async fn start(&self) -> Result<CountdownStarted, ControllerError> {
        let mut ticker = self.ticker.lock().await;
        let started = self.engine.start_countdown()?;
        self.attach_ticker(&mut ticker).await;
        Ok(started)
    }

    /// Stop the countdown, then fold its duration into the remote aggregate
    pub async fn stop(&self) -> Result<StopReport, ControllerError> {
        let stopped = {
            let mut ticker = self.ticker.lock().await;
            if let Some(running) = ticker.take() {
                running.stop().await;
            }

            match self.engine.stop_countdown() {
                Ok(stopped) => {
                    self.tick_tx.send_replace(None);
                    stopped
                }
                Err(e) => {
                    // A failed write leaves the countdown running; keep the display alive.
                    if self.engine.is_counting() {
                        self.attach_ticker(&mut ticker).await;
                    }
                    return Err(e.into());
                }
            }
        };

        let aggregate = self.sync_aggregate(&stopped).await;
        match &aggregate {
            Ok(record) => info!(
                "Aggregate for {} updated: count={}, average={}ms",
                self.uid,
                record.timer_count,
                record.average_time.as_millis()
            ),
            Err(e) => warn!(
                "Aggregate update for {} lost ({}s countdown not recorded): {}",
                self.uid,
                stopped.elapsed.as_secs(),
                e
            ),
        }

        Ok(StopReport {
            elapsed: stopped.elapsed,
            aggregate,
        })
    }

    /// Discard the countdown without touching the remote aggregate
    pub async fn reset(&self) -> Result<(), ControllerError> {
        let mut ticker = self.ticker.lock().await;
        if let Some(running) = ticker.take() {
            running.stop().await;
        }

        if let Err(e) = self.engine.reset_timer() {
            if self.engine.is_counting() {
                self.attach_ticker(&mut ticker).await;
            }
            return Err(e.into());
        }

        self.tick_tx.send_replace(None);
        Ok(())
    }

    /// Re-attach a ticker to a countdown that survived a restart.
    /// Returns whether a countdown was found.
    pub async fn resume(&self) -> bool {
        let mut ticker = self.ticker.lock().await;
        let state = self.engine.store().snapshot();
        if !state.counting {
            debug!("No persisted countdown to resume");
            return false;
        }

        info!("Resuming countdown started at {:?}", state.start);
        self.attach_ticker(&mut ticker).await;
        true
    }

    /// Stop ticking without changing the persisted countdown
    pub async fn shutdown(&self) {
        if let Some(running) = self.ticker.lock().await.take() {
            running.stop().await;
            debug!("Ticker stopped for shutdown");
        }
    }

    pub fn remaining_time(&self) -> Duration {
        self.engine.remaining_time()
    }

    pub fn is_counting(&self) -> bool {
        self.engine.is_counting()
    }

    pub fn elapsed(&self) -> Duration {
        self.engine.elapsed()
    }

    /// Persisted countdown record
    pub fn snapshot(&self) -> TimerState {
        self.engine.store().snapshot()
    }

    /// Latest tick delivered to the display
    pub fn latest_tick(&self) -> Option<Tick> {
        *self.tick_tx.borrow()
    }

    /// Follow display ticks
    pub fn subscribe(&self) -> watch::Receiver<Option<Tick>> {
        self.tick_tx.subscribe()
    }

    /// History rows for `uid`, for display
    pub async fn fetch_history(&self, uid: &str) -> Result<Vec<TimerRecord>, ControllerError> {
        Ok(self.repository.get_timers_of_user(uid).await?)
    }

    /// Aggregate for `uid`, `None` if the user never completed a countdown
    pub async fn fetch_aggregate(&self, uid: &str) -> Result<Option<TimerRecord>, ControllerError> {
        match self.repository.get_timer(uid).await {
            Ok(record) => Ok(Some(record)),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn attach_ticker(&self, slot: &mut Option<Ticker>) {
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }

        let sinks: Vec<Arc<dyn TickSink>> = vec![
            Arc::new(WatchSink::new(self.tick_tx.clone())),
            Arc::new(LogSink),
        ];
        *slot = Some(Ticker::spawn(
            Arc::clone(self.engine.store()),
            Arc::clone(self.engine.clock()),
            self.tick_interval,
            sinks,
        ));
    }

    async fn sync_aggregate(&self, stopped: &CountdownStopped) -> Result<TimerRecord, RepositoryError> {
        let _sync = self.aggregate_sync.lock().await;
        let previous = match self.repository.get_timer(&self.uid).await {
            Ok(record) => Some(record),
            Err(RepositoryError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let record = TimerRecord::with_completion(
            previous.as_ref(),
            &self.uid,
            stopped.elapsed,
            stopped.start.unwrap_or(stopped.stop),
            self.engine.clock().now(),
        );
        self.repository.upsert_timer(&record).await
    }
}
