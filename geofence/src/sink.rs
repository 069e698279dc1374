//! Status-change sinks.
//!
//! A [`StatusSink`] receives every [`StatusChangeEvent`] in the order the
//! transitions happen. Sinks are push-only: there is no replay, and a sink
//! attached later only sees later events.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::status::{GeofenceStatus, StatusChangeEvent};

/// Observer of status transitions.
pub trait StatusSink: Send + Sync {
    /// Called once per transition, in occurrence order.
    fn publish(&self, event: &StatusChangeEvent);
}

impl<F> StatusSink for F
where
    F: Fn(&StatusChangeEvent) + Send + Sync,
{
    fn publish(&self, event: &StatusChangeEvent) {
        self(event)
    }
}

impl StatusSink for Vec<Arc<dyn StatusSink>> {
    fn publish(&self, event: &StatusChangeEvent) {
        for sink in self {
            sink.publish(event);
        }
    }
}

/// Sink that discards events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&self, _event: &StatusChangeEvent) {}
}

/// Sink that logs one line per transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn publish(&self, event: &StatusChangeEvent) {
        match event.status {
            GeofenceStatus::Entered => info!(status = %event.status, "Entered the geofence"),
            GeofenceStatus::Dwelling => {
                info!(status = %event.status, "Stayed inside the geofence for the dwell period")
            }
            GeofenceStatus::Exited => info!(status = %event.status, "Left the geofence"),
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StatusChangeEvent>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all recorded events.
    pub fn events(&self) -> Vec<StatusChangeEvent> {
        self.events.lock().clone()
    }

    /// Recorded statuses, in order.
    pub fn statuses(&self) -> Vec<GeofenceStatus> {
        self.events.lock().iter().map(|e| e.status).collect()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl StatusSink for RecordingSink {
    fn publish(&self, event: &StatusChangeEvent) {
        self.events.lock().push(*event);
    }
}

/// Sink that forwards events to a tokio broadcast channel.
///
/// Receivers created with [`subscribe`](Self::subscribe) see events published
/// after they subscribed. Publishing with no receivers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StatusChangeEvent>,
}

impl BroadcastSink {
    /// Create a broadcast sink buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChangeEvent> {
        self.tx.subscribe()
    }
}

impl StatusSink for BroadcastSink {
    fn publish(&self, event: &StatusChangeEvent) {
        let _ = self.tx.send(*event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn event(status: GeofenceStatus) -> StatusChangeEvent {
        StatusChangeEvent::new(status, Instant::now())
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.publish(&event(GeofenceStatus::Entered));
        sink.publish(&event(GeofenceStatus::Exited));

        assert_eq!(
            sink.statuses(),
            vec![GeofenceStatus::Entered, GeofenceStatus::Exited]
        );
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_closure_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sink = move |_: &StatusChangeEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        };

        sink.publish(&event(GeofenceStatus::Entered));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fanout_sink() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let fanout: Vec<Arc<dyn StatusSink>> = vec![a.clone() as Arc<dyn StatusSink>, b.clone()];

        fanout.publish(&event(GeofenceStatus::Dwelling));
        assert_eq!(a.statuses(), vec![GeofenceStatus::Dwelling]);
        assert_eq!(b.statuses(), vec![GeofenceStatus::Dwelling]);
    }

    #[test]
    fn test_broadcast_late_subscriber_sees_only_new_events() {
        let sink = BroadcastSink::new(8);
        let mut early = sink.subscribe();

        sink.publish(&event(GeofenceStatus::Entered));
        let mut late = sink.subscribe();
        sink.publish(&event(GeofenceStatus::Exited));

        assert_eq!(early.try_recv().unwrap().status, GeofenceStatus::Entered);
        assert_eq!(early.try_recv().unwrap().status, GeofenceStatus::Exited);
        assert_eq!(late.try_recv().unwrap().status, GeofenceStatus::Exited);
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_without_receivers() {
        let sink = BroadcastSink::new(1);
        sink.publish(&event(GeofenceStatus::Entered));
    }
}
