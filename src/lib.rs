//! # limitcore
//!
//! The rate-limit decision core of a distributed rate-limiting service.
//!
//! Given a request that identifies a rate-limit key and declares its policy
//! (algorithm, limit, time window, burst, hits-to-consume, behavior flags),
//! [`Dispatcher::decide`] decides whether the request is under or over the
//! limit, updates the key's accounting state, and returns the remaining
//! allowance and the moment of reset.
//!
//! ## Features
//! - **Token Bucket**, fixed-window allowance decrement with reset at window expiry.
//! - **Leaky Bucket**, continuous-leak allowance model with a burst cap.
//! - **Gregorian alignment** (windows aligned to calendar boundaries, second
//!   through year, instead of a rolling duration).
//! - **Two-tier persistence**, an in-memory [`cache::Cache`] backed by an
//!   optional durable [`store::Store`], wired for a Redis-backed reference
//!   implementation behind the `redis-store` feature.
//!
//! Cluster peer discovery, wire serialization, metrics, and process
//! bootstrap are left to callers; this crate is the decision core only.

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications,
    clippy::all
)]

pub mod cache;
pub mod calendar;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod item;
pub mod leaky_bucket;
pub mod request;
pub mod response;
pub mod shard_lock;
pub mod store;
pub mod token_bucket;

pub use cache::{Cache, MemoryCache};
pub use clock::{Clock, MockClock, SystemClock};
pub use dispatcher::Dispatcher;
pub use error::{CoreError, Result};
pub use item::{CacheItem, ItemValue, LeakyBucketItem, TokenBucketItem};
pub use request::{Algorithm, Behavior, RateLimitReq, Status};
pub use response::RateLimitResp;
pub use store::{NullStore, Store};

#[cfg(feature = "redis-store")]
pub use store::RedisStore;

/// Re-export for use in tests and examples.
pub mod testing {
    pub use super::clock::MockClock;
}
