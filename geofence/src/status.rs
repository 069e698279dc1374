//! Geofence status and status-change events.

use std::fmt;
use std::time::Instant;

/// Current relationship between the tracked agent and the zone.
///
/// ```text
/// Exited --[inside sample]--> Entered --[dwell delay elapsed]--> Dwelling
///    ^                           |                                  |
///    +-------[outside sample]----+----------[outside sample]--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeofenceStatus {
    /// Inside the zone, dwell delay not yet elapsed.
    Entered,

    /// Inside the zone for at least the dwell delay.
    Dwelling,

    /// Outside the zone. Initial status.
    #[default]
    Exited,
}

impl GeofenceStatus {
    /// Whether this status means the agent is inside the zone.
    pub fn is_inside(&self) -> bool {
        match self {
            GeofenceStatus::Entered | GeofenceStatus::Dwelling => true,
            GeofenceStatus::Exited => false,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            GeofenceStatus::Entered => "entered the geofence",
            GeofenceStatus::Dwelling => "dwelling inside the geofence",
            GeofenceStatus::Exited => "exited the geofence",
        }
    }
}

impl fmt::Display for GeofenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeofenceStatus::Entered => write!(f, "ENTERED"),
            GeofenceStatus::Dwelling => write!(f, "DWELLING"),
            GeofenceStatus::Exited => write!(f, "EXITED"),
        }
    }
}

/// One status transition, emitted exactly once when it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChangeEvent {
    /// The status that became current.
    pub status: GeofenceStatus,
    /// When the transition happened.
    pub timestamp: Instant,
}

impl StatusChangeEvent {
    /// Create an event.
    pub fn new(status: GeofenceStatus, timestamp: Instant) -> Self {
        Self { status, timestamp }
    }
}
