//! Per-key serialization.
//!
//! The decision core has no surrounding server to supply mutual exclusion
//! between two concurrent calls for the same key, so it supplies its own: a
//! fixed-size pool of mutexes, with a key hashed down to one shard. Two
//! different keys usually land on different shards and never contend; two
//! calls for the same key always land on the same shard and serialize.
//!
//! This is deliberately coarser than a `DashMap<String, Mutex<()>>` per key:
//! a fixed shard count means no per-key allocation and no bound on memory
//! tied to the number of distinct keys ever seen.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

const DEFAULT_SHARD_COUNT: usize = 64;

/// A fixed-size pool of mutexes, one per shard, indexed by key hash.
pub struct ShardLock {
    shards: Vec<Mutex<()>>,
}

impl ShardLock {
    /// Creates a pool with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT)
    }

    /// Creates a pool with a specific shard count. `shard_count` must be
    /// nonzero; `0` is treated as `1`.
    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        shards.resize_with(shard_count, || Mutex::new(()));
        Self { shards }
    }

    /// Locks the shard `key` hashes to, holding it until the returned guard is
    /// dropped. Two calls with the same key never run concurrently; two calls
    /// with different keys usually don't block each other.
    pub fn lock(&self, key: &str) -> std::sync::MutexGuard<'_, ()> {
        let shard = self.shard_for(key);
        self.shards[shard]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }
}

impl Default for ShardLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardLock")
            .field("shard_count", &self.shards.len())
            .finish()
    }
}
