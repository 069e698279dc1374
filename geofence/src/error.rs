//! Errors surfaced by the geofence state machine and monitor.

use thiserror::Error;

use crate::coord::CoordError;

/// Errors that can occur while processing location samples.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    /// Sample rejected before reaching the state machine.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordError),

    /// The dwell timer could not be armed.
    ///
    /// The ENTERED transition still happened; dwell promotion is not
    /// guaranteed until a later inside sample re-arms the timer.
    #[error("Failed to schedule dwell timer: {0}")]
    TimerScheduling(String),

    /// The monitor worker has stopped and no longer accepts samples.
    #[error("Geofence monitor is closed")]
    MonitorClosed,
}
