//! Per-key accounting state kept in the [`crate::cache::Cache`] (and mirrored,
//! write-through, in the optional [`crate::store::Store`]).

use crate::request::{Algorithm, Status};
use serde::{Deserialize, Serialize};

/// Fixed-window token-bucket state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketItem {
    /// Last-observed policy limit.
    pub limit: u64,
    /// Last-observed policy duration, in milliseconds.
    pub duration: u64,
    /// Remaining allowance in the current window.
    pub remaining: u64,
    /// Absolute milliseconds-since-epoch when the current window started.
    pub created_at: u64,
    /// The last-returned status, retained so a repeated inspect of an exhausted
    /// bucket returns `OverLimit` without recomputation (the "sticky" status).
    pub status: Status,
}

/// Continuous-leak leaky-bucket state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeakyBucketItem {
    /// The burst cap: the maximum value `remaining` may hold.
    pub burst: u64,
    /// Last-observed policy limit (units per `duration`).
    pub limit: u64,
    /// Last-observed policy duration, in milliseconds.
    pub duration: u64,
    /// Current fill level, in units. Invariant: `0.0 <= remaining <= burst` after
    /// every update. Fractional to accumulate sub-unit leak between calls.
    pub remaining: f64,
    /// Absolute milliseconds-since-epoch of the last leak computation.
    pub updated_at: u64,
}

/// The tagged payload a [`CacheItem`] carries, one of the two algorithms'
/// accounting state.
///
/// A tagged union rather than dynamic typing: interpreting one variant as the
/// other algorithm is a structural tag check (see
/// [`crate::dispatcher::Dispatcher::decide`]'s algorithm-mismatch handling), not
/// something that can panic or fail a downcast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ItemValue {
    /// Token-bucket accounting state.
    TokenBucket(TokenBucketItem),
    /// Leaky-bucket accounting state.
    LeakyBucket(LeakyBucketItem),
}

impl ItemValue {
    /// The algorithm tag of this payload.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ItemValue::TokenBucket(_) => Algorithm::TokenBucket,
            ItemValue::LeakyBucket(_) => Algorithm::LeakyBucket,
        }
    }

    /// Returns the token-bucket state, if this is one.
    pub fn as_token_bucket(&self) -> Option<TokenBucketItem> {
        match self {
            ItemValue::TokenBucket(item) => Some(*item),
            ItemValue::LeakyBucket(_) => None,
        }
    }

    /// Returns the leaky-bucket state, if this is one.
    pub fn as_leaky_bucket(&self) -> Option<LeakyBucketItem> {
        match self {
            ItemValue::LeakyBucket(item) => Some(*item),
            ItemValue::TokenBucket(_) => None,
        }
    }
}

/// A single key's cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheItem {
    /// The key this item is stored under. Invariant: equals the key passed to
    /// [`crate::cache::Cache::add`].
    pub key: String,
    /// Absolute milliseconds-since-epoch deadline past which the `Cache` must
    /// treat this item as absent.
    pub expire_at: u64,
    /// The tagged accounting payload.
    pub value: ItemValue,
}

impl CacheItem {
    /// The algorithm tag of this item's payload.
    pub fn algorithm(&self) -> Algorithm {
        self.value.algorithm()
    }
}
