use std::{fs, sync::Arc, time::Duration};

use async_trait::async_trait;
use care_timer::{
    ControllerError, EngineError, InMemoryTimerHistoryRepository, ManualClock, RepositoryError,
    StoreError, TimerController, TimerHistoryRepository, TimerRecord, TimerState, TimerStateStore,
    TimerStatus, FIXED_DURATION,
};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

const UID: &str = "user-42";
const TICK: Duration = Duration::from_millis(10);

struct Harness {
    dir: TempDir,
    clock: Arc<ManualClock>,
    repo: Arc<InMemoryTimerHistoryRepository>,
    controller: TimerController,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 9, 0, 0).unwrap()
}

fn controller_at(dir: &TempDir, clock: Arc<ManualClock>, repo: Arc<InMemoryTimerHistoryRepository>) -> TimerController {
    let store = Arc::new(TimerStateStore::open(dir.path().join("timer.json")));
    TimerController::new(store, repo, clock, UID, TICK)
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let repo = Arc::new(InMemoryTimerHistoryRepository::new());
    let controller = controller_at(&dir, clock.clone(), repo.clone());
    Harness { dir, clock, repo, controller }
}

fn seeded(average_ms: u64, count: u64) -> TimerRecord {
    TimerRecord {
        uid: UID.to_string(),
        status: TimerStatus::Stopped,
        average_time: Duration::from_millis(average_ms),
        timer_count: count,
        started_at: t0() - chrono::Duration::days(1),
        updated_at: t0() - chrono::Duration::days(1),
    }
}

/// Backend whose reads take a while, like a slow network round trip
struct SlowRepository {
    inner: InMemoryTimerHistoryRepository,
    delay: Duration,
}

#[async_trait]
impl TimerHistoryRepository for SlowRepository {
    async fn get_timer(&self, uid: &str) -> Result<TimerRecord, RepositoryError> {
        sleep(self.delay).await;
        self.inner.get_timer(uid).await
    }

    async fn upsert_timer(&self, record: &TimerRecord) -> Result<TimerRecord, RepositoryError> {
        self.inner.upsert_timer(record).await
    }

    async fn get_timers_of_user(&self, uid: &str) -> Result<Vec<TimerRecord>, RepositoryError> {
        self.inner.get_timers_of_user(uid).await
    }

    async fn delete_timer(&self, uid: &str) -> Result<(), RepositoryError> {
        self.inner.delete_timer(uid).await
    }
}

/// Replace the state file with a non-empty directory so the next write fails
fn block_state_file(dir: &TempDir) {
    let path = dir.path().join("timer.json");
    fs::remove_file(&path).unwrap();
    fs::create_dir_all(path.join("blocker")).unwrap();
}

fn is_store_failure(err: &ControllerError) -> bool {
    matches!(err, ControllerError::Engine(EngineError::Store(StoreError::Io(_))))
}

#[tokio::test]
async fn start_arms_full_duration() {
    let h = harness();

    let started = h.controller.start().await.unwrap();

    assert!(h.controller.is_counting());
    assert_eq!(h.controller.remaining_time(), FIXED_DURATION);
    assert_eq!(started.start, t0());
    assert_eq!(h.repo.call_count(), 0);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn start_then_reset_makes_no_remote_call() {
    let h = harness();

    h.controller.start().await.unwrap();
    h.clock.advance(chrono::Duration::minutes(20));
    h.controller.reset().await.unwrap();

    assert!(!h.controller.is_counting());
    assert_eq!(h.controller.remaining_time(), Duration::ZERO);
    assert_eq!(h.controller.snapshot(), TimerState::idle());
    assert_eq!(h.repo.call_count(), 0);
}

#[tokio::test]
async fn stop_reports_elapsed_and_creates_aggregate() {
    let h = harness();

    h.controller.start().await.unwrap();
    h.clock.advance(chrono::Duration::milliseconds(2_000));
    let report = h.controller.stop().await.unwrap();

    assert_eq!(report.elapsed, Duration::from_millis(2_000));
    let record = report.aggregate.unwrap();
    assert_eq!(record.timer_count, 1);
    assert_eq!(record.average_time, Duration::from_millis(2_000));
    assert_eq!(record.status, TimerStatus::Stopped);
    assert_eq!(record.started_at, t0());

    assert!(!h.controller.is_counting());
    assert_eq!(h.controller.snapshot(), TimerState::idle());
    assert_eq!(TimerStateStore::load(&h.dir.path().join("timer.json")), TimerState::idle());
}

#[tokio::test]
async fn stop_folds_into_existing_average() {
    let h = harness();
    h.repo.insert(seeded(4_000, 3));

    h.controller.start().await.unwrap();
    h.clock.advance(chrono::Duration::milliseconds(2_000));
    let report = h.controller.stop().await.unwrap();

    let record = report.aggregate.unwrap();
    assert_eq!(record.average_time, Duration::from_millis(3_500));
    assert_eq!(record.timer_count, 4);

    let stored = h.controller.fetch_aggregate(UID).await.unwrap().unwrap();
    assert_eq!(stored, record);
}

#[tokio::test]
async fn stop_while_idle_is_not_running() {
    let h = harness();

    let err = h.controller.stop().await.unwrap_err();

    assert!(err.is_not_running());
    assert_eq!(h.repo.call_count(), 0);
}

#[tokio::test]
async fn second_start_is_rejected() {
    let h = harness();
    h.controller.start().await.unwrap();

    h.clock.advance(chrono::Duration::minutes(1));
    let err = h.controller.start().await.unwrap_err();

    assert!(err.is_already_running());
    assert_eq!(h.controller.snapshot().start, Some(t0()));
    h.controller.shutdown().await;
}

#[tokio::test]
async fn remote_failure_still_returns_elapsed() {
    let h = harness();
    h.repo.insert(seeded(4_000, 3));

    h.controller.start().await.unwrap();
    h.clock.advance(chrono::Duration::seconds(45));
    h.repo.fail_with(Some(RepositoryError::Network("connection refused".to_string())));
    let report = h.controller.stop().await.unwrap();

    assert_eq!(report.elapsed, Duration::from_secs(45));
    assert!(matches!(report.aggregate, Err(RepositoryError::Network(_))));
    assert!(!h.controller.is_counting());

    // The contribution is gone: the stored aggregate is unchanged.
    h.repo.fail_with(None);
    let stored = h.controller.fetch_aggregate(UID).await.unwrap().unwrap();
    assert_eq!(stored.timer_count, 3);
}

#[tokio::test]
async fn history_errors_are_remote_errors() {
    let h = harness();
    h.repo.insert(seeded(1_000, 1));

    assert_eq!(h.controller.fetch_history(UID).await.unwrap().len(), 1);
    assert!(h.controller.fetch_aggregate("nobody").await.unwrap().is_none());

    h.repo.fail_with(Some(RepositoryError::Auth("expired token".to_string())));
    let err = h.controller.fetch_history(UID).await.unwrap_err();
    assert!(matches!(err, ControllerError::Remote(RepositoryError::Auth(_))));
}

#[tokio::test]
async fn ticker_publishes_while_counting_and_clears_on_stop() {
    let h = harness();
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    h.clock.advance(chrono::Duration::seconds(12));
    let tick = timeout(
        Duration::from_secs(1),
        rx.wait_for(|tick| matches!(tick, Some(t) if t.elapsed == Duration::from_secs(12))),
    )
    .await
    .unwrap()
    .unwrap()
    .unwrap();
    assert_eq!(tick.remaining, FIXED_DURATION - Duration::from_secs(12));

    h.controller.stop().await.unwrap();
    assert!(h.controller.latest_tick().is_none());

    sleep(Duration::from_millis(50)).await;
    assert!(h.controller.latest_tick().is_none());
}

#[tokio::test]
async fn restart_resumes_from_persisted_start() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let repo = Arc::new(InMemoryTimerHistoryRepository::new());

    let first = controller_at(&dir, clock.clone(), repo.clone());
    first.start().await.unwrap();
    first.shutdown().await;
    drop(first);

    // Process comes back ten minutes later.
    clock.advance(chrono::Duration::minutes(10));
    let second = controller_at(&dir, clock.clone(), repo.clone());
    assert!(second.is_counting());

    let mut rx = second.subscribe();
    assert!(second.resume().await);
    let tick = timeout(Duration::from_secs(1), rx.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(tick.elapsed, Duration::from_secs(600));

    clock.advance(chrono::Duration::seconds(5));
    let report = second.stop().await.unwrap();
    assert_eq!(report.elapsed, Duration::from_secs(605));
    assert_eq!(report.aggregate.unwrap().timer_count, 1);
}

#[tokio::test]
async fn resume_without_countdown_does_nothing() {
    let h = harness();
    assert!(!h.controller.resume().await);
    sleep(Duration::from_millis(30)).await;
    assert!(h.controller.latest_tick().is_none());
}

#[tokio::test]
async fn overlapping_stops_both_reach_the_aggregate() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let repo = Arc::new(SlowRepository {
        inner: InMemoryTimerHistoryRepository::new(),
        delay: Duration::from_millis(100),
    });
    let store = Arc::new(TimerStateStore::open(dir.path().join("timer.json")));
    let controller = Arc::new(TimerController::new(store, repo.clone(), clock.clone(), UID, TICK));

    controller.start().await.unwrap();
    clock.advance(chrono::Duration::seconds(2));
    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.stop().await }
    });

    // The first stop has cleared local state and is waiting on the backend.
    sleep(Duration::from_millis(20)).await;
    assert!(!controller.is_counting());

    controller.start().await.unwrap();
    clock.advance(chrono::Duration::seconds(4));
    let second = controller.stop().await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(first.aggregate.unwrap().timer_count, 1);
    let second = second.aggregate.unwrap();
    assert_eq!(second.timer_count, 2);
    assert_eq!(second.average_time, Duration::from_secs(3));

    let stored = repo.inner.get_timer(UID).await.unwrap();
    assert_eq!(stored.timer_count, 2);
}

#[tokio::test]
async fn start_right_after_stop_keeps_its_ticks() {
    let h = harness();
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    h.controller.stop().await.unwrap();
    assert!(h.controller.latest_tick().is_none());

    h.clock.advance(chrono::Duration::seconds(30));
    h.controller.start().await.unwrap();
    h.clock.advance(chrono::Duration::seconds(7));
    let tick = timeout(
        Duration::from_secs(1),
        rx.wait_for(|tick| matches!(tick, Some(t) if t.elapsed == Duration::from_secs(7))),
    )
    .await
    .unwrap()
    .unwrap()
    .unwrap();
    assert_eq!(tick.remaining, FIXED_DURATION - Duration::from_secs(7));
    h.controller.shutdown().await;
}

#[tokio::test]
async fn restart_drops_sub_second_start_precision() {
    let dir = TempDir::new().unwrap();
    let started_at = t0() + chrono::Duration::milliseconds(400);
    let clock = Arc::new(ManualClock::new(started_at));
    let repo = Arc::new(InMemoryTimerHistoryRepository::new());

    let first = controller_at(&dir, clock.clone(), repo.clone());
    first.start().await.unwrap();
    clock.advance(chrono::Duration::minutes(10));
    assert_eq!(first.elapsed(), Duration::from_secs(600));
    first.shutdown().await;
    drop(first);

    // The file keeps whole seconds, so the resumed countdown started at t0.
    let second = controller_at(&dir, clock.clone(), repo);
    assert_eq!(second.snapshot().start, Some(t0()));
    assert_eq!(second.elapsed(), Duration::from_millis(600_400));

    let mut rx = second.subscribe();
    assert!(second.resume().await);
    let tick = timeout(Duration::from_secs(1), rx.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(tick.elapsed, Duration::from_millis(600_400));
    second.shutdown().await;
}

#[tokio::test]
async fn failed_stop_keeps_countdown_and_ticker() {
    let h = harness();
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    block_state_file(&h.dir);
    h.clock.advance(chrono::Duration::seconds(20));

    let err = h.controller.stop().await.unwrap_err();
    assert!(is_store_failure(&err));
    assert!(h.controller.is_counting());
    assert_eq!(h.repo.call_count(), 0);

    h.clock.advance(chrono::Duration::seconds(5));
    let tick = timeout(
        Duration::from_secs(1),
        rx.wait_for(|tick| matches!(tick, Some(t) if t.elapsed == Duration::from_secs(25))),
    )
    .await
    .unwrap()
    .unwrap()
    .unwrap();
    assert!(!tick.expired);
    h.controller.shutdown().await;
}

#[tokio::test]
async fn failed_reset_keeps_countdown_and_ticker() {
    let h = harness();
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    block_state_file(&h.dir);

    let err = h.controller.reset().await.unwrap_err();
    assert!(is_store_failure(&err));
    assert!(h.controller.is_counting());
    assert_eq!(h.controller.snapshot().start, Some(t0()));

    h.clock.advance(chrono::Duration::seconds(9));
    timeout(
        Duration::from_secs(1),
        rx.wait_for(|tick| matches!(tick, Some(t) if t.elapsed == Duration::from_secs(9))),
    )
    .await
    .unwrap()
    .unwrap();
    h.controller.shutdown().await;
}
