//! Location sources and replay.
//!
//! A [`LocationSource`] yields position fixes at its own cadence. The core
//! treats it as a pass-through: it gives no ordering or loss guarantees
//! beyond what the source provides.
//!
//! Two ways of driving a track are provided:
//!
//! - [`pump`] feeds a source into a running monitor in real time.
//! - [`simulate_track`] runs a track through a state machine on a virtual
//!   clock, which is instant and deterministic.

use std::collections::VecDeque;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SAMPLE_INTERVAL;
use crate::coord::{CoordError, Coordinate};
use crate::error::GeofenceError;
use crate::machine::GeofenceStateMachine;
use crate::monitor::MonitorHandle;
use crate::sink::{RecordingSink, StatusSink};
use crate::status::StatusChangeEvent;
use crate::timer::ManualDwellScheduler;
use crate::zone::GeofenceZone;

/// Errors that can occur while reading a track.
#[derive(Debug, Error)]
pub enum TrackError {
    /// The track file could not be read.
    #[error("Failed to read track: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a `lat,lon` pair.
    #[error("Line {line}: expected `latitude,longitude`, got {text:?}")]
    Malformed { line: usize, text: String },

    /// A line holds an out-of-range coordinate.
    #[error("Line {line}: {source}")]
    InvalidCoordinate {
        line: usize,
        #[source]
        source: CoordError,
    },
}

/// Produces location fixes.
pub trait LocationSource: Send {
    /// The next fix, or `None` when the source is exhausted.
    fn next_fix(&mut self) -> Option<Coordinate>;

    /// Interval between fixes.
    fn cadence(&self) -> Duration;
}

/// Replays a fixed list of fixes.
///
/// Track text has one `latitude,longitude` pair per line. Blank lines and
/// lines starting with `#` are ignored.
///
/// ```text
/// # walk into the zone and stay
/// 37.5600,126.9700
/// 37.5465,126.9497
/// 37.5466,126.9498
/// ```
#[derive(Debug, Clone)]
pub struct TrackReplay {
    fixes: VecDeque<Coordinate>,
    cadence: Duration,
}

impl TrackReplay {
    /// Create a replay from fixes, at the default cadence.
    pub fn new(fixes: impl IntoIterator<Item = Coordinate>) -> Self {
        Self {
            fixes: fixes.into_iter().collect(),
            cadence: DEFAULT_SAMPLE_INTERVAL,
        }
    }

    /// Load a track file.
    pub fn load(path: &Path) -> Result<Self, TrackError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// Set the interval between fixes.
    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    /// Number of fixes not yet replayed.
    pub fn remaining(&self) -> usize {
        self.fixes.len()
    }
}

impl FromStr for TrackReplay {
    type Err = TrackError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut fixes = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let malformed = || TrackError::Malformed {
                line,
                text: trimmed.to_string(),
            };

            let (lat, lon) = trimmed.split_once(',').ok_or_else(malformed)?;
            let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
            let lon: f64 = lon.trim().parse().map_err(|_| malformed())?;

            let coord = Coordinate::validated(lat, lon)
                .map_err(|source| TrackError::InvalidCoordinate { line, source })?;
            fixes.push(coord);
        }

        Ok(Self::new(fixes))
    }
}

impl LocationSource for TrackReplay {
    fn next_fix(&mut self) -> Option<Coordinate> {
        self.fixes.pop_front()
    }

    fn cadence(&self) -> Duration {
        self.cadence
    }
}

/// Summary of a [`pump`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Fixes accepted by the monitor.
    pub submitted: usize,
    /// Fixes rejected as invalid coordinates.
    pub rejected: usize,
}

/// Shortest tick [`pump`] will run at.
pub const MIN_PUMP_CADENCE: Duration = Duration::from_millis(1);

/// Feed `source` into a monitor, one fix per cadence tick.
///
/// A cadence below [`MIN_PUMP_CADENCE`] is raised to it.
///
/// The first fix is sent immediately. Invalid fixes are logged and skipped.
/// Returns when the source is exhausted, shutdown is signalled, or the
/// monitor closes.
pub async fn pump<S: LocationSource>(
    mut source: S,
    handle: &MonitorHandle,
    shutdown: CancellationToken,
) -> PumpStats {
    let mut stats = PumpStats::default();
    let mut cadence = source.cadence();
    if cadence < MIN_PUMP_CADENCE {
        warn!(
            cadence_ms = cadence.as_millis() as u64,
            "Location cadence too short, using {}ms",
            MIN_PUMP_CADENCE.as_millis()
        );
        cadence = MIN_PUMP_CADENCE;
    }
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("Location pump cancelled");
                break;
            }

            _ = ticker.tick() => {
                let Some(fix) = source.next_fix() else {
                    debug!("Location source exhausted");
                    break;
                };

                match handle.submit(fix) {
                    Ok(()) => stats.submitted += 1,
                    Err(GeofenceError::InvalidCoordinate(e)) => {
                        warn!(error = %e, "Rejected location fix");
                        stats.rejected += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "Monitor stopped accepting fixes");
                        break;
                    }
                }
            }
        }
    }

    info!(
        submitted = stats.submitted,
        rejected = stats.rejected,
        "Location pump finished"
    );
    stats
}

/// Run a source through a fresh state machine on a virtual clock.
///
/// Each fix is processed, then the clock advances by the source cadence and
/// any dwell timers that came due are delivered. After the last fix the
/// clock advances by `linger` so a final dwell can still be observed.
///
/// Every event is also published to `sink`. Timer scheduling cannot fail on
/// the virtual clock, but errors are propagated all the same.
pub fn simulate_track<S: LocationSource>(
    mut source: S,
    zone: GeofenceZone,
    dwell_delay: Duration,
    linger: Duration,
    sink: Arc<dyn StatusSink>,
) -> Result<Vec<StatusChangeEvent>, GeofenceError> {
    let scheduler = Arc::new(ManualDwellScheduler::new(Instant::now()));
    let recording = Arc::new(RecordingSink::new());
    let sinks: Vec<Arc<dyn StatusSink>> = vec![recording.clone() as Arc<dyn StatusSink>, sink];

    let mut machine =
        GeofenceStateMachine::new(zone, dwell_delay, scheduler.clone(), Arc::new(sinks));
    let cadence = source.cadence();

    let deliver = |machine: &mut GeofenceStateMachine, by: Duration| {
        for episode in scheduler.advance(by) {
            machine.on_dwell_timeout(episode, scheduler.now());
        }
    };

    while let Some(fix) = source.next_fix() {
        fix.validate()?;
        machine.on_sample(fix, scheduler.now())?;
        deliver(&mut machine, cadence);
    }
    deliver(&mut machine, linger);

    Ok(recording.events())
}
