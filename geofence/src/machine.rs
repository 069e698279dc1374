//! Geofence status state machine.
//!
//! Converts location samples and dwell-timer expiries into ENTERED, DWELLING
//! and EXITED transitions.
//!
//! # Transitions
//!
//! ```text
//! status     proximity   action
//! ---------  ---------   ----------------------------------------------
//! Exited     Inside      -> Entered, arm dwell timer, emit ENTERED
//! Entered    Inside      no event (re-arm only if the last arm failed)
//! Dwelling   Inside      no event
//! Entered    Outside     cancel dwell timer, -> Exited, emit EXITED
//! Dwelling   Outside     -> Exited, emit EXITED
//! Exited     Outside     no event
//!
//! Entered    dwell fire  -> Dwelling, emit DWELLING
//! ```
//!
//! # Concurrency
//!
//! The machine is not synchronised. Its owner must serialise `on_sample` and
//! `on_dwell_timeout`; [`crate::monitor::GeofenceMonitor`] does this with a
//! single worker task.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::coord::Coordinate;
use crate::error::GeofenceError;
use crate::sink::StatusSink;
use crate::status::{GeofenceStatus, StatusChangeEvent};
use crate::timer::{DwellScheduler, DwellTimerHandle, EpisodeId};
use crate::zone::{Classification, GeofenceZone, Proximity};

/// Default time inside the zone before ENTERED is promoted to DWELLING.
pub const DEFAULT_DWELL_DELAY: Duration = Duration::from_millis(5000);

/// What a classified sample does to the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleAction {
    Enter,
    Exit,
    RetryArm,
    Stay,
}

/// Tracks one agent against one fixed zone.
pub struct GeofenceStateMachine {
    zone: GeofenceZone,
    dwell_delay: Duration,
    status: GeofenceStatus,
    dwell_timer: Option<DwellTimerHandle>,
    /// Episode of the current ENTERED stay, if any.
    episode: Option<EpisodeId>,
    next_episode: u64,
    scheduler: Arc<dyn DwellScheduler>,
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for GeofenceStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeofenceStateMachine")
            .field("zone", &self.zone)
            .field("dwell_delay", &self.dwell_delay)
            .field("status", &self.status)
            .field("dwell_timer", &self.dwell_timer)
            .field("episode", &self.episode)
            .finish_non_exhaustive()
    }
}

impl GeofenceStateMachine {
    /// Create a machine in the EXITED status.
    ///
    /// # Arguments
    ///
    /// * `zone` - The zone to track, fixed for the machine's lifetime
    /// * `dwell_delay` - Time inside before ENTERED becomes DWELLING
    /// * `scheduler` - Arms dwell timers
    /// * `sink` - Receives every status change
    pub fn new(
        zone: GeofenceZone,
        dwell_delay: Duration,
        scheduler: Arc<dyn DwellScheduler>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            zone,
            dwell_delay,
            status: GeofenceStatus::default(),
            dwell_timer: None,
            episode: None,
            next_episode: 1,
            scheduler,
            sink,
        }
    }

    /// Current status.
    pub fn status(&self) -> GeofenceStatus {
        self.status
    }

    /// The tracked zone.
    pub fn zone(&self) -> &GeofenceZone {
        &self.zone
    }

    /// Configured dwell delay.
    pub fn dwell_delay(&self) -> Duration {
        self.dwell_delay
    }

    /// Episode whose dwell timer is currently armed.
    pub fn armed_episode(&self) -> Option<EpisodeId> {
        self.dwell_timer.as_ref().map(DwellTimerHandle::episode)
    }

    /// Process one location sample.
    ///
    /// `sample` must be a valid coordinate; out-of-range values are a caller
    /// error and are not checked here.
    ///
    /// # Returns
    ///
    /// The transition caused by the sample, if any. The event has already
    /// been published to the sink.
    ///
    /// # Errors
    ///
    /// [`GeofenceError::TimerScheduling`] if entering the zone could not arm
    /// the dwell timer. The ENTERED transition still happened and was
    /// published; the next inside sample retries arming.
    pub fn on_sample(
        &mut self,
        sample: Coordinate,
        now: Instant,
    ) -> Result<Option<StatusChangeEvent>, GeofenceError> {
        let classification = self.zone.classify(&sample);
        let action = self.action_for(&classification);

        debug!(
            lat = sample.latitude,
            lon = sample.longitude,
            distance_m = classification.distance_m,
            proximity = %classification.proximity,
            status = %self.status,
            "Classified location sample"
        );

        match action {
            SampleAction::Enter => {
                let episode = EpisodeId::new(self.next_episode);
                self.next_episode += 1;
                self.episode = Some(episode);

                let event = self.transition(GeofenceStatus::Entered, now);
                self.arm_dwell_timer(episode)?;
                Ok(Some(event))
            }
            SampleAction::Exit => {
                self.cancel_dwell_timer();
                self.episode = None;
                Ok(Some(self.transition(GeofenceStatus::Exited, now)))
            }
            SampleAction::RetryArm => {
                if let Some(episode) = self.episode {
                    self.arm_dwell_timer(episode)?;
                }
                Ok(None)
            }
            SampleAction::Stay => Ok(None),
        }
    }

    /// Handle expiry of the dwell timer armed for `episode`.
    ///
    /// Promotes ENTERED to DWELLING only if `episode` is the currently armed,
    /// uncancelled timer. Stale or duplicate expiries are ignored.
    pub fn on_dwell_timeout(
        &mut self,
        episode: EpisodeId,
        now: Instant,
    ) -> Option<StatusChangeEvent> {
        let armed = match &self.dwell_timer {
            Some(handle) if handle.episode() == episode && !handle.is_cancelled() => true,
            _ => false,
        };
        if !armed {
            debug!(episode = %episode, status = %self.status, "Ignoring stale dwell timeout");
            return None;
        }

        // The timer has fired; the handle is spent
        self.dwell_timer = None;

        match self.status {
            GeofenceStatus::Entered => Some(self.transition(GeofenceStatus::Dwelling, now)),
            GeofenceStatus::Dwelling | GeofenceStatus::Exited => {
                debug!(
                    episode = %episode,
                    status = %self.status,
                    "Dwell timeout without ENTERED status"
                );
                None
            }
        }
    }

    fn action_for(&self, classification: &Classification) -> SampleAction {
        match (self.status, classification.proximity) {
            (GeofenceStatus::Exited, Proximity::Inside) => SampleAction::Enter,
            (GeofenceStatus::Entered, Proximity::Inside) if self.dwell_timer.is_none() => {
                SampleAction::RetryArm
            }
            (GeofenceStatus::Entered | GeofenceStatus::Dwelling, Proximity::Inside) => {
                SampleAction::Stay
            }
            (GeofenceStatus::Entered | GeofenceStatus::Dwelling, Proximity::Outside) => {
                SampleAction::Exit
            }
            (GeofenceStatus::Exited, Proximity::Outside) => SampleAction::Stay,
        }
    }

    fn transition(&mut self, to: GeofenceStatus, now: Instant) -> StatusChangeEvent {
        let from = self.status;
        self.status = to;

        info!(from = %from, to = %to, "Geofence status transition");

        let event = StatusChangeEvent::new(to, now);
        self.sink.publish(&event);
        event
    }

    fn arm_dwell_timer(&mut self, episode: EpisodeId) -> Result<(), GeofenceError> {
        // At most one live timer: the previous one is cancelled first
        self.cancel_dwell_timer();

        match self.scheduler.arm(episode, self.dwell_delay) {
            Ok(handle) => {
                debug!(
                    episode = %episode,
                    delay_ms = self.dwell_delay.as_millis() as u64,
                    "Dwell timer armed"
                );
                self.dwell_timer = Some(handle);
                Ok(())
            }
            Err(e) => {
                warn!(episode = %episode, error = %e, "Dwell timer could not be armed");
                Err(e)
            }
        }
    }

    fn cancel_dwell_timer(&mut self) {
        if let Some(handle) = self.dwell_timer.take() {
            debug!(episode = %handle.episode(), "Dwell timer cancelled");
            handle.cancel();
        }
    }
}
