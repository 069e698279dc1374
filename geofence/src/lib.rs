//! Geofence - enter, dwell and exit tracking for a circular zone
//!
//! This library turns a stream of position fixes into discrete status
//! transitions for one circular geofence:
//!
//! - **ENTERED** when a fix first lands inside the zone
//! - **DWELLING** when the agent has stayed inside for the dwell delay
//! - **EXITED** when a fix lands outside again
//!
//! # Layout
//!
//! - [`coord`]: coordinates and haversine distance
//! - [`zone`]: the circular zone and inside/outside classification
//! - [`machine`]: the status state machine
//! - [`timer`]: one-shot dwell timers
//! - [`monitor`]: a tokio worker that serialises samples and timer expiries
//! - [`sink`]: status-change observers
//! - [`source`]: location sources, real-time pumping and simulated replay
//! - [`config`]: INI-backed configuration

pub mod config;
pub mod coord;
pub mod error;
pub mod machine;
pub mod monitor;
pub mod sink;
pub mod source;
pub mod status;
pub mod timer;
pub mod zone;

pub use coord::{haversine_distance, Coordinate};
pub use error::GeofenceError;
pub use machine::GeofenceStateMachine;
pub use monitor::{GeofenceMonitor, MonitorHandle};
pub use status::{GeofenceStatus, StatusChangeEvent};
pub use zone::GeofenceZone;
