//! The request type the decision core accepts, and the behavior/algorithm tags
//! that travel with it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which accounting algorithm a [`RateLimitReq`] (and the [`crate::item::CacheItem`]
/// it's matched against) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Fixed-window allowance, decremented per request, reset at window expiry.
    TokenBucket,
    /// Continuous-leak allowance with a burst cap.
    LeakyBucket,
}

/// Whether a decided request was allowed to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The request's `hits` were within the remaining allowance.
    UnderLimit,
    /// The request's `hits` exceeded the remaining allowance.
    OverLimit,
}

/// A bit set of optional behaviors a [`RateLimitReq`] can request.
///
/// Hand-rolled rather than pulled from a crate: it's two flags wide and the
/// crate has no other use for a general bitflags dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Behavior(u32);

impl Behavior {
    /// No optional behavior requested.
    pub const NONE: Behavior = Behavior(0);
    /// Next request drops stored state and returns full allowance.
    pub const RESET_REMAINING: Behavior = Behavior(1 << 0);
    /// Align the window to a calendar interval rather than a rolling duration.
    pub const DURATION_IS_GREGORIAN: Behavior = Behavior(1 << 1);

    /// Returns whether `self` includes every flag set in `other`.
    pub const fn contains(self, other: Behavior) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether no flags are set.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Behavior {
    type Output = Behavior;
    fn bitor(self, rhs: Behavior) -> Behavior {
        Behavior(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Behavior {
    fn bitor_assign(&mut self, rhs: Behavior) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (flag, name) in [
            (Behavior::RESET_REMAINING, "RESET_REMAINING"),
            (Behavior::DURATION_IS_GREGORIAN, "DURATION_IS_GREGORIAN"),
        ] {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A rate-limit decision request.
///
/// Immutable within a single [`crate::dispatcher::Dispatcher::decide`] call; the
/// engine reads it and the key's prior state, and produces a
/// [`crate::response::RateLimitResp`] plus the next state to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitReq {
    /// Opaque identity of the limited subject (namespace + unique key, as built
    /// by the caller).
    pub key: String,
    /// Which algorithm to apply.
    pub algorithm: Algorithm,
    /// The allowance per window (token bucket) or units leaked per `duration`
    /// (leaky bucket). Must be positive.
    pub limit: u64,
    /// The window size in milliseconds (token bucket) or the leak timescale in
    /// milliseconds (leaky bucket). Must be positive.
    pub duration: u64,
    /// Units the caller wishes to consume. `0` means "inspect only".
    pub hits: u64,
    /// Leaky-bucket burst cap. `0` means "equals `limit`". Unused for token bucket.
    pub burst: u64,
    /// Optional behavior flags.
    pub behavior: Behavior,
}

impl RateLimitReq {
    /// Creates a new request with no burst override and no behavior flags.
    pub fn new(key: impl Into<String>, algorithm: Algorithm, limit: u64, duration: u64, hits: u64) -> Self {
        Self {
            key: key.into(),
            algorithm,
            limit,
            duration,
            hits,
            burst: 0,
            behavior: Behavior::NONE,
        }
    }

    /// Sets the leaky-bucket burst override.
    pub fn with_burst(mut self, burst: u64) -> Self {
        self.burst = burst;
        self
    }

    /// Sets the behavior flags.
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// The effective leaky-bucket burst: `burst` if set, else `limit`.
    pub fn effective_burst(&self) -> u64 {
        if self.burst > 0 {
            self.burst
        } else {
            self.limit
        }
    }
}
