//! One-shot dwell timers.
//!
//! The state machine never sleeps itself. On every transition into ENTERED it
//! asks a [`DwellScheduler`] to arm a one-shot timer for the dwell delay and
//! keeps the returned [`DwellTimerHandle`]. When the timer fires, the
//! scheduler reports the episode id back to whoever owns the machine, which
//! then calls `on_dwell_timeout`.
//!
//! Two schedulers are provided:
//!
//! - [`TokioDwellScheduler`] sleeps on a tokio task and invokes a callback.
//! - [`ManualDwellScheduler`] keeps a virtual clock; `advance` reports which
//!   timers came due. Used for deterministic replay and tests.
//!
//! # Cancellation
//!
//! Each handle owns a [`CancellationToken`]. Cancelling the handle, or
//! dropping it, cancels the token, and a cancelled timer never reports.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::GeofenceError;

/// Identifies one ENTERED episode and the dwell timer armed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeId(u64);

impl EpisodeId {
    /// Wrap a raw episode number.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw episode number.
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to an armed dwell timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct DwellTimerHandle {
    episode: EpisodeId,
    token: CancellationToken,
}

impl DwellTimerHandle {
    /// Create a handle for `episode` guarded by `token`.
    pub fn new(episode: EpisodeId, token: CancellationToken) -> Self {
        Self { episode, token }
    }

    /// Episode the timer was armed for.
    pub fn episode(&self) -> EpisodeId {
        self.episode
    }

    /// Whether the timer has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the timer. It will never report.
    pub fn cancel(self) {
        // Drop does the work
    }
}

impl Drop for DwellTimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Arms one-shot dwell timers.
pub trait DwellScheduler: Send + Sync {
    /// Arm a timer that reports `episode` once `delay` has elapsed.
    ///
    /// Returns [`GeofenceError::TimerScheduling`] when the timer cannot be
    /// armed.
    fn arm(&self, episode: EpisodeId, delay: Duration) -> Result<DwellTimerHandle, GeofenceError>;
}

/// Callback invoked by [`TokioDwellScheduler`] when a timer fires.
pub type DwellCallback = Arc<dyn Fn(EpisodeId) + Send + Sync>;

/// Dwell scheduler backed by tokio sleeps.
///
/// Each armed timer is a spawned task on the runtime current at `arm` time.
/// The callback runs on that task, so it must hand the episode off to the
/// machine's owner (typically through a channel) rather than mutate state.
#[derive(Clone)]
pub struct TokioDwellScheduler {
    on_fire: DwellCallback,
}

impl TokioDwellScheduler {
    /// Create a scheduler that reports fired episodes to `on_fire`.
    pub fn new<F>(on_fire: F) -> Self
    where
        F: Fn(EpisodeId) + Send + Sync + 'static,
    {
        Self {
            on_fire: Arc::new(on_fire),
        }
    }
}

impl fmt::Debug for TokioDwellScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioDwellScheduler").finish_non_exhaustive()
    }
}

impl DwellScheduler for TokioDwellScheduler {
    fn arm(&self, episode: EpisodeId, delay: Duration) -> Result<DwellTimerHandle, GeofenceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GeofenceError::TimerScheduling(e.to_string()))?;

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let on_fire = Arc::clone(&self.on_fire);

        runtime.spawn(async move {
            tokio::select! {
                biased;

                _ = cancelled.cancelled() => {
                    trace!(episode = %episode, "Dwell timer task cancelled");
                }

                _ = tokio::time::sleep(delay) => {
                    debug!(
                        episode = %episode,
                        delay_ms = delay.as_millis() as u64,
                        "Dwell timer fired"
                    );
                    on_fire(episode);
                }
            }
        });

        Ok(DwellTimerHandle::new(episode, token))
    }
}

#[derive(Debug)]
struct PendingDwell {
    episode: EpisodeId,
    deadline: Instant,
    token: CancellationToken,
}

#[derive(Debug)]
struct ManualClock {
    now: Instant,
    pending: Vec<PendingDwell>,
    fail_arming: bool,
}

/// Dwell scheduler driven by a virtual clock.
///
/// Time only moves when [`advance`](Self::advance) is called.
///
/// ```
/// use std::time::{Duration, Instant};
/// use geofence::timer::{DwellScheduler, EpisodeId, ManualDwellScheduler};
///
/// let scheduler = ManualDwellScheduler::new(Instant::now());
/// let _handle = scheduler.arm(EpisodeId::new(1), Duration::from_secs(5)).unwrap();
///
/// assert!(scheduler.advance(Duration::from_secs(4)).is_empty());
/// assert_eq!(scheduler.advance(Duration::from_secs(1)), vec![EpisodeId::new(1)]);
/// ```
#[derive(Debug)]
pub struct ManualDwellScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualDwellScheduler {
    /// Create a scheduler whose virtual clock starts at `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            clock: Mutex::new(ManualClock {
                now: start,
                pending: Vec::new(),
                fail_arming: false,
            }),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Instant {
        self.clock.lock().now
    }

    /// Move the clock forward by `by`.
    ///
    /// Returns the episodes whose timers came due and were not cancelled,
    /// in deadline order. Cancelled timers are discarded.
    pub fn advance(&self, by: Duration) -> Vec<EpisodeId> {
        let mut clock = self.clock.lock();
        clock.now += by;
        let now = clock.now;

        clock.pending.retain(|p| !p.token.is_cancelled());

        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut clock.pending)
            .into_iter()
            .partition(|p| p.deadline <= now);
        clock.pending = pending;

        due.sort_by_key(|p| p.deadline);
        due.into_iter().map(|p| p.episode).collect()
    }

    /// Number of armed timers that are neither fired nor cancelled.
    pub fn pending_count(&self) -> usize {
        self.clock
            .lock()
            .pending
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .count()
    }

    /// Make subsequent `arm` calls fail with `TimerScheduling`.
    pub fn set_fail_arming(&self, fail: bool) {
        self.clock.lock().fail_arming = fail;
    }
}

impl DwellScheduler for ManualDwellScheduler {
    fn arm(&self, episode: EpisodeId, delay: Duration) -> Result<DwellTimerHandle, GeofenceError> {
        let mut clock = self.clock.lock();
        if clock.fail_arming {
            return Err(GeofenceError::TimerScheduling(
                "manual scheduler refused to arm".to_string(),
            ));
        }

        let token = CancellationToken::new();
        let deadline = clock.now + delay;
        clock.pending.push(PendingDwell {
            episode,
            deadline,
            token: token.clone(),
        });

        Ok(DwellTimerHandle::new(episode, token))
    }
}
