//! Error types for the rate-limit decision core.
//!
//! The core only ever fails the *single request* it was asked to decide; it
//! never surfaces Cache/Store inconsistencies or algorithm mismatches as errors
//! (those are handled locally and logged, see `dispatcher`). Only the two kinds
//! below reach the caller.

use std::fmt;

/// The error type for the rate-limit decision core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// `behavior` requested Gregorian alignment but `duration` was not one of the
    /// seven recognized calendar-interval lengths.
    InvalidGregorianDuration {
        /// The duration, in milliseconds, that was not a recognized Gregorian interval.
        duration_ms: u64,
    },
    /// The injected [`crate::clock::Clock`] failed to produce a reading.
    ///
    /// The built-in [`crate::clock::SystemClock`] and [`crate::clock::MockClock`]
    /// never fail; this variant exists for custom clocks wrapping a fallible time
    /// source (a hardware timer, an NTP-checked clock, ...).
    ClockFailure {
        /// Implementation-defined description of what went wrong.
        reason: String,
    },
}

impl CoreError {
    /// Creates an [`CoreError::InvalidGregorianDuration`] error.
    pub fn invalid_gregorian_duration(duration_ms: u64) -> Self {
        Self::InvalidGregorianDuration { duration_ms }
    }

    /// Creates a [`CoreError::ClockFailure`] error.
    pub fn clock_failure(reason: impl Into<String>) -> Self {
        Self::ClockFailure {
            reason: reason.into(),
        }
    }

    /// Returns whether this error indicates an unrecognized Gregorian duration.
    pub fn is_invalid_gregorian_duration(&self) -> bool {
        matches!(self, Self::InvalidGregorianDuration { .. })
    }

    /// Returns whether this error indicates a clock failure.
    pub fn is_clock_failure(&self) -> bool {
        matches!(self, Self::ClockFailure { .. })
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGregorianDuration { duration_ms } => write!(
                f,
                "duration {}ms is not a recognized Gregorian interval (expected one of \
                 1000, 60000, 3600000, 86400000, 604800000, 2629800000, 31557600000)",
                duration_ms
            ),
            Self::ClockFailure { reason } => write!(f, "clock failure: {}", reason),
        }
    }
}

impl std::error::Error for CoreError {}

/// A specialized `Result` type for the rate-limit decision core.
pub type Result<T> = std::result::Result<T, CoreError>;
