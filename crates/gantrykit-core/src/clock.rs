//! Time sources and bounded waiting
//!
//! Every blocking wait in GantryKit (boot settle, homing settle,
//! dead-reckoning delay, poll loops) goes through a [`Clock`], so tests can
//! substitute [`ManualClock`] and observe the requested sleeps without
//! waiting in real time.
//!
//! Poll loops that used to spin forever are expressed as "wait for a
//! condition, bounded by a [`WaitPolicy`]": each iteration consults a
//! [`Deadline`], which checks a [`CancelToken`] and an optional timeout.

use crate::error::{MotionError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source with blocking sleep
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Clock shared between the components of one machine
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock implementation backed by [`Instant`] and [`std::thread::sleep`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Create a shared handle to a new system clock
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Virtual clock for tests
///
/// `sleep` returns immediately, advances virtual time and records the
/// requested duration.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Create a new manual clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance virtual time without recording a sleep
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// All sleeps requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    /// Forget recorded sleeps
    pub fn clear_sleeps(&self) {
        self.sleeps.lock().clear();
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        *self.now.lock() += duration;
    }
}

/// Cooperative cancellation flag
///
/// Clones share the same flag. Long-running loops check it once per poll.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Bounds for a polling wait
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Pause between polls that made no progress
    pub poll_interval: Duration,
}

impl WaitPolicy {
    /// Wait indefinitely, polling every `poll_interval`
    pub fn unbounded(poll_interval: Duration) -> Self {
        Self {
            timeout: None,
            poll_interval,
        }
    }

    /// Wait at most `timeout`
    pub fn bounded(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            poll_interval,
        }
    }

    /// Start the clock on a wait governed by this policy
    pub fn start<'a>(&self, clock: &'a dyn Clock, cancel: &'a CancelToken) -> Deadline<'a> {
        Deadline {
            clock,
            cancel,
            started: clock.elapsed(),
            policy: *self,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_millis(10))
    }
}

/// A running wait
pub struct Deadline<'a> {
    clock: &'a dyn Clock,
    cancel: &'a CancelToken,
    started: Duration,
    policy: WaitPolicy,
}

impl Deadline<'_> {
    /// Fail if the wait was cancelled or has run out of time
    ///
    /// `on_timeout` builds the error reported for an expired timeout.
    pub fn check(&self, on_timeout: impl FnOnce(u64) -> MotionError) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MotionError::Cancelled.into());
        }
        if let Some(timeout) = self.policy.timeout {
            if self.clock.elapsed().saturating_sub(self.started) >= timeout {
                return Err(on_timeout(timeout.as_millis() as u64).into());
            }
        }
        Ok(())
    }

    /// Sleep one poll interval
    pub fn pause(&self) {
        self.clock.sleep(self.policy.poll_interval);
    }
}
