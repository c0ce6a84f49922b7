//! The `Cache` capability: an in-memory, expiry-aware map from key to
//! [`CacheItem`] that the dispatcher consults on every call.
//!
//! Grounded on the in-memory store pattern used elsewhere in the rate-limiting
//! space: a concurrent map keyed by the rate-limit key, sharded internally so
//! lookups on unrelated keys never contend.

use crate::item::CacheItem;
use dashmap::DashMap;

/// A cache of [`CacheItem`]s, keyed by the rate-limit key.
///
/// Every `Cache` implementation must treat an item past its `expire_at` as
/// absent on lookup, as if [`Cache::remove`] had already been called for it.
/// This is load-bearing: the dispatcher never re-checks `expire_at` itself
/// after a `get` returns `Some`.
pub trait Cache: Send + Sync + 'static {
    /// Returns the item stored under `key`, or `None` if absent or expired.
    ///
    /// `now` is the caller's own clock reading (see [`crate::clock::Clock`]),
    /// not a fresh wall-clock read taken inside the implementation. This is
    /// what lets a [`crate::clock::MockClock`]-driven test observe window
    /// expiry deterministically instead of racing the real clock.
    fn get(&self, key: &str, now: u64) -> Option<CacheItem>;

    /// Inserts or replaces the item stored under `key`. The item's own `key`
    /// field and `item`'s cache key must match.
    fn add(&self, item: CacheItem);

    /// Removes the item stored under `key`, if any.
    fn remove(&self, key: &str);

    /// Adjusts the `expire_at` deadline of the item stored under `key`,
    /// without touching its `value`. A no-op if `key` is absent.
    fn update_expiration(&self, key: &str, absolute_ms: u64);
}

/// A [`Cache`] backed by a sharded concurrent hash map, with no persistence
/// beyond process lifetime.
///
/// This is the reference `Cache` every [`crate::dispatcher::Dispatcher`] needs
/// at minimum; a [`crate::store::Store`] is layered underneath it as an
/// optional, slower fallback rather than a replacement.
#[derive(Debug, Default)]
pub struct MemoryCache {
    items: DashMap<String, CacheItem>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// The number of non-expired items currently tracked.
    ///
    /// Runs a full scan; intended for tests and diagnostics, not hot paths.
    pub fn len(&self, now: u64) -> usize {
        self.items.iter().filter(|entry| entry.expire_at > now).count()
    }

    /// Returns whether the cache holds no non-expired items.
    pub fn is_empty(&self, now: u64) -> bool {
        self.len(now) == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str, now: u64) -> Option<CacheItem> {
        let entry = self.items.get(key)?;
        if entry.expire_at <= now {
            drop(entry);
            self.items.remove(key);
            return None;
        }
        Some(entry.clone())
    }

    fn add(&self, item: CacheItem) {
        self.items.insert(item.key.clone(), item);
    }

    fn remove(&self, key: &str) {
        self.items.remove(key);
    }

    fn update_expiration(&self, key: &str, absolute_ms: u64) {
        if let Some(mut entry) = self.items.get_mut(key) {
            entry.expire_at = absolute_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemValue, TokenBucketItem};
    use crate::request::Status;

    fn item(key: &str, expire_at: u64) -> CacheItem {
        CacheItem {
            key: key.to_string(),
            expire_at,
            value: ItemValue::TokenBucket(TokenBucketItem {
                limit: 10,
                duration: 1000,
                remaining: 5,
                created_at: 0,
                status: Status::UnderLimit,
            }),
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let cache = MemoryCache::new();
        cache.add(item("k1", 1_000_000));
        let got = cache.get("k1", 0).unwrap();
        assert_eq!(got.key, "k1");
    }

    #[test]
    fn expired_item_reads_as_absent_and_is_evicted() {
        let cache = MemoryCache::new();
        cache.add(item("k1", 100));
        assert!(cache.get("k1", 1_000).is_none());
        assert_eq!(cache.len(1_000), 0);
    }

    #[test]
    fn remove_clears_the_item() {
        let cache = MemoryCache::new();
        cache.add(item("k1", 1_000_000));
        cache.remove("k1");
        assert!(cache.get("k1", 0).is_none());
    }

    #[test]
    fn missing_key_is_none() {
        let cache = MemoryCache::new();
        assert!(cache.get("nope", 0).is_none());
    }

    #[test]
    fn update_expiration_touches_only_the_deadline() {
        let cache = MemoryCache::new();
        cache.add(item("k1", 1_000));
        cache.update_expiration("k1", 5_000);
        let got = cache.get("k1", 1_000).unwrap();
        assert_eq!(got.expire_at, 5_000);
        assert_eq!(got.value, item("k1", 1_000).value);
    }

    #[test]
    fn update_expiration_on_missing_key_is_a_no_op() {
        let cache = MemoryCache::new();
        cache.update_expiration("nope", 5_000);
        assert!(cache.get("nope", 0).is_none());
    }
}
