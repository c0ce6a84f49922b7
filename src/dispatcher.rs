//! Algorithm Dispatcher: routes a request to the right engine, coordinates
//! the Cache/Store pair, and supplies per-key serialization.

use crate::cache::Cache;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::item::{CacheItem, ItemValue};
use crate::leaky_bucket;
use crate::request::{Algorithm, RateLimitReq};
use crate::response::RateLimitResp;
use crate::shard_lock::ShardLock;
use crate::store::{NullStore, Store};
use crate::token_bucket;
use std::sync::Arc;

/// Ties a [`Cache`], an optional [`Store`], and a [`Clock`] together behind
/// the single [`Dispatcher::decide`] entry point.
///
/// Per-key serialization is supplied here, not by `Cache`/`Store`
/// themselves (see `shard_lock`): the lock is held for the Cache lookup and
/// engine computation, then released before the `Store` write-through call,
/// so a slow `Store` never blocks unrelated callers on the same key for
/// longer than necessary and never blocks callers on other keys at all.
pub struct Dispatcher<Clk: Clock = SystemClock> {
    cache: Arc<dyn Cache>,
    store: Option<Arc<dyn Store>>,
    clock: Clk,
    locks: ShardLock,
}

impl Dispatcher<SystemClock> {
    /// Creates a dispatcher with no durable `Store` and the system clock.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            store: None,
            clock: SystemClock,
            locks: ShardLock::new(),
        }
    }
}

impl<Clk: Clock> Dispatcher<Clk> {
    /// Attaches a durable `Store` as a cache-miss fallback and write-through
    /// target.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the clock this dispatcher reads `now` from.
    pub fn with_clock<NewClk: Clock>(self, clock: NewClk) -> Dispatcher<NewClk> {
        Dispatcher {
            cache: self.cache,
            store: self.store,
            clock,
            locks: self.locks,
        }
    }

    /// Decides one request: looks up prior state, dispatches to the
    /// matching algorithm engine, persists the result, and returns the
    /// response.
    pub fn decide(&self, req: &RateLimitReq) -> Result<RateLimitResp> {
        let now = self.clock.now();
        let _guard = self.locks.lock(&req.key);

        let item = self.resolve_item(req, now);

        match req.algorithm {
            Algorithm::TokenBucket => self.decide_token_bucket(item, req, now),
            Algorithm::LeakyBucket => self.decide_leaky_bucket(item, req, now),
        }
    }

    /// Cache lookup, Store fallback, sanity check, and algorithm-mismatch
    /// eviction. Must be called while holding the per-key lock.
    fn resolve_item(&self, req: &RateLimitReq, now: u64) -> Option<CacheItem> {
        let mut item = self.cache.get(&req.key, now);

        if item.is_none() {
            if let Some(store) = &self.store {
                if let Some(found) = store.get(&req.key) {
                    item = Some(found);
                }
            }
        }

        if let Some(it) = &item {
            if it.key != req.key {
                tracing::warn!(
                    key = %req.key,
                    item_key = %it.key,
                    "cache/store item key mismatch; treating as missing"
                );
                item = None;
            }
        }

        if let Some(it) = &item {
            if it.algorithm() != req.algorithm {
                tracing::debug!(
                    key = %req.key,
                    cached_algorithm = ?it.algorithm(),
                    requested_algorithm = ?req.algorithm,
                    "cached item algorithm mismatch; evicting and recreating"
                );
                self.cache.remove(&req.key);
                if let Some(store) = &self.store {
                    if let Err(e) = store.on_remove(&req.key) {
                        tracing::warn!(key = %req.key, error = %e, "store eviction on algorithm mismatch failed");
                    }
                }
                item = None;
            }
        }

        // A Store-only find (cache missed, Store had it) is reinstalled into
        // the Cache immediately, independent of whether this request goes on
        // to mutate it.
        if let Some(it) = &item {
            if self.cache.get(&req.key, now).is_none() {
                self.cache.add(it.clone());
            }
        }

        item
    }

    fn notify_store(&self, item: &CacheItem) {
        if let Some(store) = &self.store {
            if let Err(e) = store.on_change(item) {
                tracing::warn!(key = %item.key, error = %e, "store write-through failed");
            }
        }
    }

    fn evict(&self, key: &str) {
        self.cache.remove(key);
        if let Some(store) = &self.store {
            if let Err(e) = store.on_remove(key) {
                tracing::warn!(key = %key, error = %e, "store eviction failed");
            }
        }
    }

    fn decide_token_bucket(&self, item: Option<CacheItem>, req: &RateLimitReq, now: u64) -> Result<RateLimitResp> {
        let outcome = match item {
            None => token_bucket::fresh(req, now)?,
            Some(cache_item) => {
                let tb = cache_item
                    .value
                    .as_token_bucket()
                    .expect("algorithm mismatch already resolved in resolve_item");
                token_bucket::existing(tb, cache_item.expire_at, req, now)?
            }
        };

        match outcome {
            token_bucket::Outcome::Reset { resp } => {
                self.evict(&req.key);
                Ok(resp)
            }
            token_bucket::Outcome::Unchanged { resp } => Ok(resp),
            token_bucket::Outcome::Mutated { item, resp } => {
                let cache_item = CacheItem {
                    key: req.key.clone(),
                    expire_at: resp.reset_time,
                    value: ItemValue::TokenBucket(item),
                };
                self.cache.add(cache_item.clone());
                self.notify_store(&cache_item);
                Ok(resp)
            }
        }
    }

    fn decide_leaky_bucket(&self, item: Option<CacheItem>, req: &RateLimitReq, now: u64) -> Result<RateLimitResp> {
        let prior_expire_at = item.as_ref().map(|it| it.expire_at);

        let outcome = match item {
            None => leaky_bucket::fresh(req, now)?,
            Some(cache_item) => {
                let lb = cache_item
                    .value
                    .as_leaky_bucket()
                    .expect("algorithm mismatch already resolved in resolve_item");
                leaky_bucket::existing(lb, req, now)?
            }
        };

        match outcome {
            leaky_bucket::Outcome::Unchanged { resp } => Ok(resp),
            leaky_bucket::Outcome::Mutated { item, resp, expire_refresh } => {
                let expire_at = expire_refresh
                    .or(prior_expire_at)
                    .unwrap_or_else(|| now + item.duration);
                let cache_item = CacheItem {
                    key: req.key.clone(),
                    expire_at,
                    value: ItemValue::LeakyBucket(item),
                };
                self.cache.add(cache_item.clone());
                self.notify_store(&cache_item);
                Ok(resp)
            }
        }
    }
}

impl<Clk: Clock> std::fmt::Debug for Dispatcher<Clk> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
