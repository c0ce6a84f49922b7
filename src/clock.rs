//! Clock abstraction for time-based operations.
//!
//! Provides a trait-based clock interface to allow for deterministic testing
//! and platform-specific time implementations. Every timestamp the core reads
//! (window starts, leak updates, Gregorian interval boundaries) flows through
//! this single seam so that tests can drive time by hand instead of sleeping.

use std::time::Duration;

/// A trait representing a wall clock, used for rate limiting operations.
///
/// This trait abstracts over different time sources to enable testing and
/// platform-specific implementations. Implementations are expected to be
/// monotonic for any single process: subsequent calls to `now()` should never
/// return a value less than a previous call.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current time in milliseconds since the Unix epoch, interpreted
    /// as UTC civil time by the Gregorian interval resolver (see [`crate::calendar`]).
    fn now(&self) -> u64;

    /// Returns the current time as a `Duration` since the epoch.
    fn now_duration(&self) -> Duration {
        Duration::from_millis(self.now())
    }
}

/// The default production clock, backed by the system's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_millis() as u64
    }
}

/// A clock that allows manual control of the current time.
///
/// This is the clock every deterministic test in this crate is built on: it lets
/// a test advance time by an exact number of milliseconds instead of sleeping and
/// hoping the scheduler cooperates.
#[derive(Debug, Default)]
pub struct MockClock {
    now: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl Clone for MockClock {
    fn clone(&self) -> Self {
        Self {
            now: std::sync::Arc::clone(&self.now),
        }
    }
}

impl MockClock {
    /// Creates a new `MockClock` starting at the given time in milliseconds.
    pub fn new(initial_time: u64) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(initial_time)),
        }
    }

    /// Advances the clock by the specified number of milliseconds.
    pub fn advance(&self, ms: u64) {
        let _ = self.now.fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }

    /// Sets the clock to the specified time in milliseconds.
    pub fn set(&self, ms: u64) {
        self.now.store(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}
