//! Token-Bucket Engine: fixed-window allowance decrement with reset at window
//! expiry.
//!
//! A pair of pure functions over an owned [`TokenBucketItem`] snapshot rather
//! than an atomics-backed struct: the [`crate::dispatcher::Dispatcher`] is the
//! one place that owns a key's state for the duration of a call (see
//! `shard_lock`), so there is no concurrent access within `fresh`/`existing`
//! itself to design around.

use crate::calendar::gregorian_expiration;
use crate::error::Result;
use crate::item::TokenBucketItem;
use crate::request::{Behavior, RateLimitReq, Status};
use crate::response::RateLimitResp;

/// The outcome of one [`fresh`] or [`existing`] call.
pub enum Outcome {
    /// The item should be installed/kept with the given state and the Store
    /// notified of it.
    Mutated { item: TokenBucketItem, resp: RateLimitResp },
    /// The response can be returned as-is; nothing changed enough to need a
    /// write-through (inspect-only calls, and rejected "hits > remaining"
    /// requests, persist nothing).
    Unchanged { resp: RateLimitResp },
    /// `RESET_REMAINING` fired: the caller must evict the item from Cache and
    /// Store and return `resp` immediately.
    Reset { resp: RateLimitResp },
}

fn window_end(now: u64, duration: u64, behavior: Behavior) -> Result<u64> {
    if behavior.contains(Behavior::DURATION_IS_GREGORIAN) {
        gregorian_expiration(now, duration)
    } else {
        Ok(now + duration)
    }
}

/// Computes the next state for a key with no prior item.
pub fn fresh(req: &RateLimitReq, now: u64) -> Result<Outcome> {
    let expire = window_end(now, req.duration, req.behavior)?;

    let (status, remaining) = if req.hits > req.limit {
        (Status::OverLimit, req.limit)
    } else {
        (Status::UnderLimit, req.limit - req.hits)
    };

    let item = TokenBucketItem {
        limit: req.limit,
        duration: req.duration,
        remaining,
        created_at: now,
        status,
    };

    let resp = RateLimitResp {
        status,
        limit: req.limit,
        remaining,
        reset_time: expire,
    };

    Ok(Outcome::Mutated { item, resp })
}

/// Computes the next state for a key with prior state `item`, whose current
/// cache entry expires at `prior_expire_at`.
///
/// `prior_expire_at` is threaded in rather than recomputed from
/// `item.created_at + item.duration`, since under Gregorian alignment the two
/// are not interchangeable (a calendar month doesn't divide evenly into
/// `duration`-sized chunks) and the item carries no `expire_at` field of its
/// own, only the owning [`crate::item::CacheItem`] does.
pub fn existing(mut item: TokenBucketItem, prior_expire_at: u64, req: &RateLimitReq, now: u64) -> Result<Outcome> {
    if req.behavior.contains(Behavior::RESET_REMAINING) {
        let resp = RateLimitResp {
            status: Status::UnderLimit,
            limit: req.limit,
            remaining: req.limit,
            reset_time: 0,
        };
        return Ok(Outcome::Reset { resp });
    }

    if req.limit != item.limit {
        let delta = req.limit as i128 - item.limit as i128;
        let adjusted = item.remaining as i128 + delta;
        item.remaining = adjusted.max(0) as u64;
        item.limit = req.limit;
    }

    let mut reset_time = prior_expire_at;

    if req.duration != item.duration {
        let mut expire = if req.behavior.contains(Behavior::DURATION_IS_GREGORIAN) {
            gregorian_expiration(now, req.duration)?
        } else {
            item.created_at + req.duration
        };
        if expire <= now {
            item.created_at = now;
            expire = window_end(now, req.duration, req.behavior)?;
            item.remaining = item.limit;
        }
        item.duration = req.duration;
        reset_time = expire;
    }

    let mut resp = RateLimitResp {
        status: item.status,
        limit: req.limit,
        remaining: item.remaining,
        reset_time,
    };

    // Inspect-only never persists, so any step 2/3 limit/duration/window
    // renewal computed above applies to this response only; a later inspect
    // re-derives the same delta from the still-unwritten cached base.
    if req.hits == 0 {
        return Ok(Outcome::Unchanged { resp });
    }

    if item.remaining == 0 {
        resp.status = Status::OverLimit;
        item.status = Status::OverLimit;
        return Ok(Outcome::Mutated { item, resp });
    }

    if req.hits == item.remaining {
        item.remaining = 0;
        item.status = Status::UnderLimit;
        resp.status = Status::UnderLimit;
        resp.remaining = 0;
        return Ok(Outcome::Mutated { item, resp });
    }

    if req.hits > item.remaining {
        resp.status = Status::OverLimit;
        return Ok(Outcome::Unchanged { resp });
    }

    item.remaining -= req.hits;
    item.status = Status::UnderLimit;
    resp.status = Status::UnderLimit;
    resp.remaining = item.remaining;
    Ok(Outcome::Mutated { item, resp })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Algorithm;

    fn req(limit: u64, duration: u64, hits: u64) -> RateLimitReq {
        RateLimitReq::new("k", Algorithm::TokenBucket, limit, duration, hits)
    }

    #[test]
    fn fresh_under_limit() {
        let outcome = fresh(&req(10, 1000, 3), 0).unwrap();
        match outcome {
            Outcome::Mutated { item, resp } => {
                assert_eq!(resp.status, Status::UnderLimit);
                assert_eq!(resp.remaining, 7);
                assert_eq!(item.remaining, 7);
                assert_eq!(resp.reset_time, 1000);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn fresh_over_limit_does_not_persist_consumption() {
        let outcome = fresh(&req(10, 1000, 11), 0).unwrap();
        match outcome {
            Outcome::Mutated { item, resp } => {
                assert_eq!(resp.status, Status::OverLimit);
                assert_eq!(resp.remaining, 10);
                assert_eq!(item.remaining, 10);
            }
            _ => panic!("expected Mutated"),
        }
    }

    fn base_item() -> TokenBucketItem {
        TokenBucketItem {
            limit: 10,
            duration: 1000,
            remaining: 4,
            created_at: 0,
            status: Status::UnderLimit,
        }
    }

    #[test]
    fn exact_drain_is_under_limit() {
        let outcome = existing(base_item(), 1000, &req(10, 1000, 4), 100).unwrap();
        match outcome {
            Outcome::Mutated { item, resp } => {
                assert_eq!(resp.status, Status::UnderLimit);
                assert_eq!(resp.remaining, 0);
                assert_eq!(item.remaining, 0);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn over_remaining_does_not_consume() {
        let outcome = existing(base_item(), 1000, &req(10, 1000, 5), 100).unwrap();
        match outcome {
            Outcome::Unchanged { resp } => {
                assert_eq!(resp.status, Status::OverLimit);
            }
            _ => panic!("expected Unchanged (non-consuming reject)"),
        }
    }

    #[test]
    fn sticky_over_limit_on_zero_remaining() {
        let mut item = base_item();
        item.remaining = 0;
        let outcome = existing(item, 1000, &req(10, 1000, 1), 100).unwrap();
        match outcome {
            Outcome::Mutated { item, resp } => {
                assert_eq!(resp.status, Status::OverLimit);
                assert_eq!(item.status, Status::OverLimit);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn inspect_only_does_not_mutate() {
        let outcome = existing(base_item(), 1000, &req(10, 1000, 0), 100).unwrap();
        match outcome {
            Outcome::Unchanged { resp } => {
                assert_eq!(resp.remaining, 4);
            }
            _ => panic!("expected Unchanged"),
        }
    }

    #[test]
    fn reset_remaining_evicts() {
        let outcome = existing(
            base_item(),
            1000,
            &req(10, 1000, 0).with_behavior(Behavior::RESET_REMAINING),
            100,
        )
        .unwrap();
        match outcome {
            Outcome::Reset { resp } => {
                assert_eq!(resp.remaining, 10);
                assert_eq!(resp.reset_time, 0);
            }
            _ => panic!("expected Reset"),
        }
    }

    #[test]
    fn policy_limit_raise_preserves_consumed_so_far() {
        // consumed so far = 10 - 4 = 6; raising limit to 20 gives remaining = 20 - 6 = 14
        let outcome = existing(base_item(), 1000, &req(20, 1000, 0), 100).unwrap();
        match outcome {
            Outcome::Unchanged { resp } => assert_eq!(resp.remaining, 14),
            _ => panic!("expected Unchanged"),
        }
    }

    #[test]
    fn window_retroactively_expired_renews() {
        let item = base_item(); // created_at=0, duration=1000
        let outcome = existing(item, 1000, &req(10, 500, 0), 2000).unwrap();
        match outcome {
            Outcome::Unchanged { resp } => {
                assert_eq!(resp.remaining, 10);
                assert_eq!(resp.reset_time, 2500);
            }
            _ => panic!("expected Unchanged"),
        }
    }
}
