//! Integration tests for the Geofence Monitor.
//!
//! These tests verify the complete monitor flow including:
//! - Handle → inbox → state machine → subscribers
//! - Dwell promotion driven by real tokio timers (on a paused clock)
//! - Dwell cancellation on early exit
//! - Location pumping from a replayed track
//!
//! Run with: `cargo test --test monitor_integration`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use geofence::config::GeofenceConfig;
use geofence::coord::Coordinate;
use geofence::sink::{NullSink, RecordingSink};
use geofence::source::{pump, TrackReplay};
use geofence::{GeofenceError, GeofenceMonitor, GeofenceStatus, MonitorHandle, StatusChangeEvent};

// ============================================================================
// Helper Functions
// ============================================================================

/// Zone center used by every test (Seoul, 100 m radius by default).
const CENTER: Coordinate = Coordinate::new(37.5465, 126.9497);

/// A fix a couple of kilometers from the center.
const FAR: Coordinate = Coordinate::new(37.56, 126.97);

/// Dwell delay used by every test.
const DWELL: Duration = Duration::from_millis(5000);

struct Running {
    handle: MonitorHandle,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Running {
    async fn stop(self) {
        self.shutdown.cancel();
        self.task.await.expect("Monitor task should complete cleanly");
    }
}

fn start_monitor(sink: Arc<dyn geofence::sink::StatusSink>) -> Running {
    let config = GeofenceConfig::default().with_dwell_delay(DWELL);
    let (monitor, handle) = GeofenceMonitor::new(&config, sink).expect("Default zone is valid");
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(monitor.run(shutdown.clone()));
    Running {
        handle,
        shutdown,
        task,
    }
}

/// Let the monitor settle, then drain everything the receiver has buffered.
async fn drain(rx: &mut broadcast::Receiver<StatusChangeEvent>) -> Vec<GeofenceStatus> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        statuses.push(event.status);
    }
    statuses
}

// ============================================================================
// Integration Tests
// ============================================================================

/// The reference example: a fix at the center enters, a fix kilometers away exits.
#[tokio::test(start_paused = true)]
async fn test_reference_enter_and_exit() {
    let running = start_monitor(Arc::new(NullSink));
    let mut rx = running.handle.subscribe();

    let entered = running.handle.submit_and_wait(CENTER).await.unwrap();
    assert_eq!(entered.map(|e| e.status), Some(GeofenceStatus::Entered));

    let exited = running.handle.submit_and_wait(FAR).await.unwrap();
    assert_eq!(exited.map(|e| e.status), Some(GeofenceStatus::Exited));

    assert_eq!(
        drain(&mut rx).await,
        vec![GeofenceStatus::Entered, GeofenceStatus::Exited]
    );

    running.stop().await;
}

/// Two inside fixes in a row produce a single ENTERED.
#[tokio::test(start_paused = true)]
async fn test_repeated_inside_enters_once() {
    let running = start_monitor(Arc::new(NullSink));
    let mut rx = running.handle.subscribe();

    assert!(running.handle.submit_and_wait(CENTER).await.unwrap().is_some());
    assert!(running.handle.submit_and_wait(CENTER).await.unwrap().is_none());

    assert_eq!(drain(&mut rx).await, vec![GeofenceStatus::Entered]);

    running.stop().await;
}

/// Staying inside for the dwell delay promotes ENTERED to DWELLING.
#[tokio::test(start_paused = true)]
async fn test_dwell_promotion() {
    let recording = Arc::new(RecordingSink::new());
    let running = start_monitor(recording.clone());
    let mut rx = running.handle.subscribe();

    running.handle.submit(CENTER).unwrap();

    tokio::time::sleep(DWELL - Duration::from_millis(100)).await;
    assert_eq!(running.handle.status(), GeofenceStatus::Entered);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(running.handle.status(), GeofenceStatus::Dwelling);

    assert_eq!(
        drain(&mut rx).await,
        vec![GeofenceStatus::Entered, GeofenceStatus::Dwelling]
    );
    assert_eq!(
        recording.statuses(),
        vec![GeofenceStatus::Entered, GeofenceStatus::Dwelling]
    );

    // Dwell timestamp is one dwell delay after the enter timestamp
    let events = recording.events();
    let gap = events[1].timestamp.duration_since(events[0].timestamp);
    assert!(gap >= DWELL, "Dwell fired early: {:?}", gap);
    assert!(gap < DWELL + Duration::from_millis(50), "Dwell fired late: {:?}", gap);

    running.stop().await;
}

/// Leaving before the dwell delay cancels the pending DWELLING.
#[tokio::test(start_paused = true)]
async fn test_early_exit_cancels_dwell() {
    let running = start_monitor(Arc::new(NullSink));
    let mut rx = running.handle.subscribe();

    running.handle.submit(CENTER).unwrap();
    tokio::time::sleep(DWELL / 2).await;
    running.handle.submit(FAR).unwrap();

    // Well past the original deadline
    tokio::time::sleep(DWELL * 2).await;

    assert_eq!(running.handle.status(), GeofenceStatus::Exited);
    assert_eq!(
        drain(&mut rx).await,
        vec![GeofenceStatus::Entered, GeofenceStatus::Exited]
    );

    running.stop().await;
}

/// Re-entering after an early exit starts a fresh dwell period.
#[tokio::test(start_paused = true)]
async fn test_reentry_restarts_dwell_period() {
    let running = start_monitor(Arc::new(NullSink));
    let mut rx = running.handle.subscribe();

    running.handle.submit(CENTER).unwrap();
    tokio::time::sleep(Duration::from_millis(2000)).await;
    running.handle.submit(FAR).unwrap();
    running.handle.submit(CENTER).unwrap();

    // First episode's deadline (t=5s) passes without promotion
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(running.handle.status(), GeofenceStatus::Entered);

    // Second episode's deadline (t=7s)
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(
        drain(&mut rx).await,
        vec![
            GeofenceStatus::Entered,
            GeofenceStatus::Exited,
            GeofenceStatus::Entered,
            GeofenceStatus::Dwelling,
        ]
    );

    running.stop().await;
}

/// Status watchers start from the current status and see later changes.
#[tokio::test(start_paused = true)]
async fn test_watch_status() {
    let running = start_monitor(Arc::new(NullSink));
    let mut watch = running.handle.watch_status();
    assert_eq!(*watch.borrow(), GeofenceStatus::Exited);

    running.handle.submit(CENTER).unwrap();
    watch.changed().await.unwrap();
    assert_eq!(*watch.borrow_and_update(), GeofenceStatus::Entered);

    // A late watcher sees the current value, not the history
    let late = running.handle.watch_status();
    assert_eq!(*late.borrow(), GeofenceStatus::Entered);

    running.stop().await;
}

/// Invalid coordinates are rejected at the handle and never reach the machine.
#[tokio::test(start_paused = true)]
async fn test_invalid_coordinate_rejected() {
    let running = start_monitor(Arc::new(NullSink));
    let mut rx = running.handle.subscribe();

    let result = running
        .handle
        .submit_and_wait(Coordinate::new(-91.0, 0.0))
        .await;
    assert!(matches!(result, Err(GeofenceError::InvalidCoordinate(_))));
    assert!(drain(&mut rx).await.is_empty());

    running.stop().await;
}

/// After shutdown, submissions fail with MonitorClosed.
#[tokio::test(start_paused = true)]
async fn test_submit_after_shutdown() {
    let running = start_monitor(Arc::new(NullSink));
    let handle = running.handle.clone();
    running.stop().await;

    assert!(matches!(
        handle.submit(CENTER),
        Err(GeofenceError::MonitorClosed)
    ));
}

/// The worker exits on its own when every handle is dropped, even with a
/// dwell timer still pending.
#[tokio::test(start_paused = true)]
async fn test_monitor_stops_when_handles_dropped() {
    let running = start_monitor(Arc::new(NullSink));
    running.handle.submit(CENTER).unwrap();

    let Running { handle, task, .. } = running;
    drop(handle);

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("Monitor should stop once handles are dropped")
        .expect("Monitor task should not panic");
}

/// A replayed track pumped at 500 ms cadence produces enter, dwell, exit.
#[tokio::test(start_paused = true)]
async fn test_pump_replayed_track() {
    let running = start_monitor(Arc::new(NullSink));
    let mut rx = running.handle.subscribe();

    // 12 fixes inside (6 s) then one outside
    let mut fixes = vec![CENTER; 12];
    fixes.push(FAR);
    let track = TrackReplay::new(fixes).with_cadence(Duration::from_millis(500));

    let stats = pump(track, &running.handle, CancellationToken::new()).await;
    assert_eq!(stats.submitted, 13);
    assert_eq!(stats.rejected, 0);

    assert_eq!(
        drain(&mut rx).await,
        vec![
            GeofenceStatus::Entered,
            GeofenceStatus::Dwelling,
            GeofenceStatus::Exited,
        ]
    );

    running.stop().await;
}

/// A pump stops early when cancelled.
#[tokio::test(start_paused = true)]
async fn test_pump_cancelled() {
    let running = start_monitor(Arc::new(NullSink));
    let track = TrackReplay::new(vec![CENTER; 100]).with_cadence(Duration::from_millis(500));

    let cancel = CancellationToken::new();
    let pump_cancel = cancel.clone();
    let handle = running.handle.clone();
    let pump_task = tokio::spawn(async move { pump(track, &handle, pump_cancel).await });

    tokio::time::sleep(Duration::from_millis(1200)).await;
    cancel.cancel();

    let stats = pump_task.await.unwrap();
    assert!(stats.submitted >= 2 && stats.submitted < 100);

    running.stop().await;
}

/// A zero cadence is raised to the minimum tick instead of panicking.
#[tokio::test(start_paused = true)]
async fn test_pump_zero_cadence() {
    let running = start_monitor(Arc::new(NullSink));
    let mut rx = running.handle.subscribe();

    let track = TrackReplay::new(vec![CENTER, CENTER, FAR]).with_cadence(Duration::ZERO);
    let stats = pump(track, &running.handle, CancellationToken::new()).await;
    assert_eq!(stats.submitted, 3);

    assert_eq!(
        drain(&mut rx).await,
        vec![GeofenceStatus::Entered, GeofenceStatus::Exited]
    );

    running.stop().await;
}
