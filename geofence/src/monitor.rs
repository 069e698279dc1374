//! Geofence monitor: the serialised owner of a [`GeofenceStateMachine`].
//!
//! Location samples and dwell-timer expiries arrive from different tasks.
//! Both are funnelled into a single inbox consumed by one worker, so the
//! machine only ever sees one message at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  Sample    ┌──────────────────────────────────┐
//! │  MonitorHandle   │──────────► │                                  │
//! └──────────────────┘            │   inbox ──► GeofenceMonitor::run │
//! ┌──────────────────┐  Elapsed   │               │                  │
//! │ TokioDwellSched. │──────────► │               ▼                  │
//! └──────────────────┘            │      GeofenceStateMachine        │
//!                                 └───────────────┬──────────────────┘
//!                                                 │ StatusChangeEvent
//!                                  ┌──────────────┼──────────────┐
//!                                  ▼              ▼              ▼
//!                              user sink     broadcast       watch
//! ```
//!
//! # Example
//!
//! ```ignore
//! use geofence::config::GeofenceConfig;
//! use geofence::monitor::GeofenceMonitor;
//! use geofence::sink::TracingSink;
//!
//! let (monitor, handle) = GeofenceMonitor::new(&GeofenceConfig::default(), Arc::new(TracingSink))?;
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(monitor.run(shutdown.clone()));
//!
//! handle.submit(Coordinate::new(37.5465, 126.9497))?;
//! ```

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, GeofenceConfig};
use crate::coord::Coordinate;
use crate::error::GeofenceError;
use crate::machine::GeofenceStateMachine;
use crate::sink::{BroadcastSink, StatusSink};
use crate::status::{GeofenceStatus, StatusChangeEvent};
use crate::timer::{EpisodeId, TokioDwellScheduler};
use crate::zone::GeofenceZone;

type SampleReply = oneshot::Sender<Result<Option<StatusChangeEvent>, GeofenceError>>;

/// Messages consumed by the monitor worker.
#[derive(Debug)]
enum MonitorMessage {
    /// A validated location sample.
    Sample {
        coord: Coordinate,
        reply: Option<SampleReply>,
    },
    /// The dwell timer for an episode fired.
    DwellElapsed(EpisodeId),
}

/// Publishes to the user sink, the broadcast channel and the status watch.
struct MonitorSink {
    user: Arc<dyn StatusSink>,
    broadcast: BroadcastSink,
    status_tx: watch::Sender<GeofenceStatus>,
}

impl StatusSink for MonitorSink {
    fn publish(&self, event: &StatusChangeEvent) {
        self.user.publish(event);
        self.broadcast.publish(event);
        self.status_tx.send_replace(event.status);
    }
}

/// Current monitor time, taken from tokio's clock so paused-time tests agree.
fn monitor_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Long-running worker that owns the state machine.
pub struct GeofenceMonitor {
    machine: GeofenceStateMachine,
    inbox_rx: mpsc::UnboundedReceiver<MonitorMessage>,
}

impl std::fmt::Debug for GeofenceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeofenceMonitor")
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl GeofenceMonitor {
    /// Create a monitor and the handle used to feed it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidZone`] if the configured zone is invalid.
    pub fn new(
        config: &GeofenceConfig,
        sink: Arc<dyn StatusSink>,
    ) -> Result<(Self, MonitorHandle), ConfigError> {
        let zone = config.zone()?;
        Ok(Self::with_zone(zone, config, sink))
    }

    /// Create a monitor for an already validated zone.
    pub fn with_zone(
        zone: GeofenceZone,
        config: &GeofenceConfig,
        sink: Arc<dyn StatusSink>,
    ) -> (Self, MonitorHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(GeofenceStatus::default());
        let broadcast = BroadcastSink::new(config.event_channel_capacity);

        // Weak so that pending timers do not keep the worker alive
        let timer_tx = inbox_tx.downgrade();
        let scheduler = TokioDwellScheduler::new(move |episode| {
            if let Some(tx) = timer_tx.upgrade() {
                let _ = tx.send(MonitorMessage::DwellElapsed(episode));
            }
        });

        let monitor_sink = MonitorSink {
            user: sink,
            broadcast: broadcast.clone(),
            status_tx,
        };

        let machine = GeofenceStateMachine::new(
            zone,
            config.dwell_delay,
            Arc::new(scheduler),
            Arc::new(monitor_sink),
        );

        let handle = MonitorHandle {
            inbox_tx,
            status_rx,
            broadcast,
        };

        (Self { machine, inbox_rx }, handle)
    }

    /// Run until shutdown is signalled or every handle is dropped.
    pub async fn run(self, shutdown: CancellationToken) {
        let Self {
            mut machine,
            mut inbox_rx,
        } = self;

        info!(
            zone = %machine.zone(),
            dwell_ms = machine.dwell_delay().as_millis() as u64,
            "Geofence monitor starting"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Geofence monitor shutting down");
                    break;
                }

                message = inbox_rx.recv() => {
                    match message {
                        Some(message) => Self::handle_message(&mut machine, message),
                        None => {
                            debug!("All monitor handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        info!(status = %machine.status(), "Geofence monitor stopped");
        // Dropping the machine cancels any armed dwell timer
    }

    fn handle_message(machine: &mut GeofenceStateMachine, message: MonitorMessage) {
        let now = monitor_now();
        match message {
            MonitorMessage::Sample { coord, reply } => {
                let result = machine.on_sample(coord, now);
                if let Err(e) = &result {
                    warn!(error = %e, "Location sample processed with error");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            MonitorMessage::DwellElapsed(episode) => {
                machine.on_dwell_timeout(episode, now);
            }
        }
    }
}

/// Cloneable handle for submitting samples and observing status.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    inbox_tx: mpsc::UnboundedSender<MonitorMessage>,
    status_rx: watch::Receiver<GeofenceStatus>,
    broadcast: BroadcastSink,
}

impl MonitorHandle {
    /// Submit a sample without waiting for it to be processed.
    ///
    /// # Errors
    ///
    /// - [`GeofenceError::InvalidCoordinate`] if the sample is out of range
    /// - [`GeofenceError::MonitorClosed`] if the worker has stopped
    pub fn submit(&self, coord: Coordinate) -> Result<(), GeofenceError> {
        coord.validate()?;
        self.inbox_tx
            .send(MonitorMessage::Sample { coord, reply: None })
            .map_err(|_| GeofenceError::MonitorClosed)
    }

    /// Submit a sample and wait for the transition it caused.
    ///
    /// # Errors
    ///
    /// As [`submit`](Self::submit), plus [`GeofenceError::TimerScheduling`]
    /// if the sample entered the zone but the dwell timer could not be armed.
    pub async fn submit_and_wait(
        &self,
        coord: Coordinate,
    ) -> Result<Option<StatusChangeEvent>, GeofenceError> {
        coord.validate()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inbox_tx
            .send(MonitorMessage::Sample {
                coord,
                reply: Some(reply_tx),
            })
            .map_err(|_| GeofenceError::MonitorClosed)?;

        reply_rx.await.map_err(|_| GeofenceError::MonitorClosed)?
    }

    /// Latest published status.
    pub fn status(&self) -> GeofenceStatus {
        *self.status_rx.borrow()
    }

    /// Watch the current status. The receiver starts with the current value.
    pub fn watch_status(&self) -> watch::Receiver<GeofenceStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to status changes published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChangeEvent> {
        self.broadcast.subscribe()
    }

    /// Whether the worker has stopped.
    pub fn is_closed(&self) -> bool {
        self.inbox_tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    #[test]
    fn test_new_rejects_invalid_zone() {
        let config = GeofenceConfig::default().with_radius_m(0.0);
        let result = GeofenceMonitor::new(&config, Arc::new(NullSink));
        assert!(matches!(result, Err(ConfigError::InvalidZone(_))));
    }

    #[test]
    fn test_submit_rejects_invalid_coordinate() {
        let (_monitor, handle) =
            GeofenceMonitor::new(&GeofenceConfig::default(), Arc::new(NullSink)).unwrap();
        let result = handle.submit(Coordinate::new(120.0, 0.0));
        assert!(matches!(result, Err(GeofenceError::InvalidCoordinate(_))));
    }

    #[test]
    fn test_initial_status_is_exited() {
        let (_monitor, handle) =
            GeofenceMonitor::new(&GeofenceConfig::default(), Arc::new(NullSink)).unwrap();
        assert_eq!(handle.status(), GeofenceStatus::Exited);
    }

    #[test]
    fn test_submit_after_monitor_dropped() {
        let (monitor, handle) =
            GeofenceMonitor::new(&GeofenceConfig::default(), Arc::new(NullSink)).unwrap();
        drop(monitor);
        let result = handle.submit(Coordinate::new(37.5465, 126.9497));
        assert!(matches!(result, Err(GeofenceError::MonitorClosed)));
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_wait_returns_transition() {
        let (monitor, handle) =
            GeofenceMonitor::new(&GeofenceConfig::default(), Arc::new(NullSink)).unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(monitor.run(shutdown.clone()));

        let event = handle
            .submit_and_wait(Coordinate::new(37.5465, 126.9497))
            .await
            .unwrap();
        assert_eq!(event.map(|e| e.status), Some(GeofenceStatus::Entered));
        assert_eq!(handle.status(), GeofenceStatus::Entered);

        shutdown.cancel();
        task.await.unwrap();
    }
}
