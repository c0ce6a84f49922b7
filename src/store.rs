//! The `Store` capability: an optional, durable fallback consulted on a
//! `Cache` miss and kept in sync via write-through on every mutation.
//!
//! Deliberately a narrow, synchronous trait: a `Store` call sits on the
//! critical path of a single `decide`, held only for the duration of that one
//! call (never under the per-key shard lock, see `shard_lock`), so it must
//! stay a short, blocking I/O call rather than grow into a second async entry
//! point for the core.

use crate::item::CacheItem;

/// A durable fallback behind the [`crate::cache::Cache`].
///
/// Implementations are free to be lossy or eventually consistent; the
/// dispatcher only ever treats a `Store` miss the same as "no prior state",
/// never as an error.
pub trait Store: Send + Sync + 'static {
    /// Returns the item stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Option<CacheItem>;

    /// Called after the cache is updated for a mutating request (`hits > 0`),
    /// so the store can mirror the new state. Best-effort: a failure here is
    /// logged, never surfaced to the caller of `decide`.
    fn on_change(&self, item: &CacheItem) -> Result<(), String>;

    /// Called when a `RESET_REMAINING` request evicts a key from the cache,
    /// so the store drops its own copy too.
    fn on_remove(&self, key: &str) -> Result<(), String>;
}

/// A [`Store`] that holds nothing and never finds anything.
///
/// The default when a caller wires up a [`crate::dispatcher::Dispatcher`]
/// without a durable backing: cache misses are simply treated as "no prior
/// state", and write-through notifications are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl Store for NullStore {
    fn get(&self, _key: &str) -> Option<CacheItem> {
        None
    }

    fn on_change(&self, _item: &CacheItem) -> Result<(), String> {
        Ok(())
    }

    fn on_remove(&self, _key: &str) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(feature = "redis-store")]
mod redis_store {
    use super::*;
    use redis::{Client, Commands, RedisError};
    use std::sync::Mutex;

    /// A [`Store`] backed by Redis, using the blocking client.
    ///
    /// Items round-trip as JSON strings under a key-prefixed Redis key,
    /// with a `PEXPIRE` matching the item's own `expire_at` so Redis itself
    /// garbage-collects entries this process never gets a chance to evict.
    pub struct RedisStore {
        client: Client,
        conn: Mutex<redis::Connection>,
        key_prefix: String,
    }

    impl RedisStore {
        /// Connects to `redis_url` (e.g. `redis://127.0.0.1/`), prefixing every
        /// key this store touches with `key_prefix`.
        pub fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self, RedisError> {
            let client = Client::open(redis_url)?;
            let conn = client.get_connection()?;
            Ok(Self {
                client,
                conn: Mutex::new(conn),
                key_prefix: key_prefix.into(),
            })
        }

        fn namespaced(&self, key: &str) -> String {
            format!("{}{}", self.key_prefix, key)
        }

        fn with_conn<T>(&self, f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>) -> Result<T, String> {
            let mut guard = self.conn.lock().map_err(|e| e.to_string())?;
            match f(&mut guard) {
                Ok(v) => Ok(v),
                Err(e) if e.is_io_error() => {
                    // Connection dropped; reconnect once and retry.
                    *guard = self.client.get_connection().map_err(|e| e.to_string())?;
                    f(&mut guard).map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            }
        }
    }

    impl Store for RedisStore {
        fn get(&self, key: &str) -> Option<CacheItem> {
            let namespaced = self.namespaced(key);
            let raw: Option<String> = self
                .with_conn(|conn| conn.get(&namespaced))
                .inspect_err(|e| tracing::warn!(key = %key, error = %e, "redis store get failed"))
                .ok()
                .flatten();
            raw.and_then(|raw| match serde_json::from_str(&raw) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "redis store item failed to deserialize");
                    None
                }
            })
        }

        fn on_change(&self, item: &CacheItem) -> Result<(), String> {
            let namespaced = self.namespaced(&item.key);
            let raw = serde_json::to_string(item).map_err(|e| e.to_string())?;
            let ttl_ms = item.expire_at.saturating_sub(now_ms());
            let ttl_ms = ttl_ms.max(1);
            self.with_conn(|conn| conn.pset_ex(&namespaced, raw, ttl_ms))
        }

        fn on_remove(&self, key: &str) -> Result<(), String> {
            let namespaced = self.namespaced(key);
            self.with_conn(|conn| conn.del::<_, ()>(&namespaced))
        }
    }

    fn now_ms() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
