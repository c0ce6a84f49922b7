//! Leaky-Bucket Engine: continuous-leak allowance model with a burst cap.
//!
//! Unlike the token bucket's fixed window, a leaky bucket gains `remaining`
//! continuously over time (units drip in at `limit/duration` per ms) up to
//! `burst`. A pair of pure functions over an owned [`LeakyBucketItem`]
//! snapshot, mirroring `token_bucket`'s shape.

use crate::calendar::{gregorian_duration, gregorian_expiration};
use crate::error::Result;
use crate::item::LeakyBucketItem;
use crate::request::{Behavior, RateLimitReq, Status};
use crate::response::RateLimitResp;

/// The outcome of one [`fresh`] or [`existing`] call.
///
/// Unlike the token bucket, a leaky-bucket `RESET_REMAINING` is
/// non-destructive: it never produces a `Reset` variant, since the item
/// survives and keeps flowing through the rest of the pipeline.
pub enum Outcome {
    /// The item should be installed/kept with the given state and the Store
    /// notified of it. `expire_refresh`, if set, is the new absolute
    /// millisecond deadline the owning `CacheItem::expire_at` must adopt;
    /// `None` means the caller should keep whatever `expire_at` it already
    /// has (only a successful consuming request refreshes it).
    Mutated {
        item: LeakyBucketItem,
        resp: RateLimitResp,
        expire_refresh: Option<u64>,
    },
    /// Nothing about the item's persisted state changed; no write-through is
    /// needed.
    Unchanged { resp: RateLimitResp },
}

fn rate_ms_per_unit(duration: u64, limit: u64) -> f64 {
    duration as f64 / limit.max(1) as f64
}

fn reset_time_for(now: u64, limit: u64, remaining_floor: u64, rate: f64) -> u64 {
    let units_needed = (limit as f64 - remaining_floor as f64).max(0.0);
    now + (units_needed * rate).round() as u64
}

/// Computes the next state for a key with no prior item.
pub fn fresh(req: &RateLimitReq, now: u64) -> Result<Outcome> {
    let burst = req.effective_burst();

    let local_duration = if req.behavior.contains(Behavior::DURATION_IS_GREGORIAN) {
        gregorian_expiration(now, req.duration)?.saturating_sub(now)
    } else {
        req.duration
    };

    let rate = if req.behavior.contains(Behavior::DURATION_IS_GREGORIAN) {
        rate_ms_per_unit(gregorian_duration(now, req.duration)?, req.limit)
    } else {
        rate_ms_per_unit(req.duration, req.limit)
    };

    let (status, remaining) = if req.hits > burst {
        (Status::OverLimit, 0u64)
    } else {
        (Status::UnderLimit, burst - req.hits)
    };

    let item = LeakyBucketItem {
        burst,
        limit: req.limit,
        duration: local_duration,
        remaining: remaining as f64,
        updated_at: now,
    };

    let reset_time = reset_time_for(now, req.limit, remaining, rate);

    let resp = RateLimitResp {
        status,
        limit: req.limit,
        remaining,
        reset_time,
    };

    Ok(Outcome::Mutated {
        item,
        resp,
        expire_refresh: Some(now + local_duration),
    })
}

/// Computes the next state for a key with prior state `item`.
pub fn existing(mut item: LeakyBucketItem, req: &RateLimitReq, now: u64) -> Result<Outcome> {
    let mut changed = false;

    if req.behavior.contains(Behavior::RESET_REMAINING) {
        item.remaining = req.effective_burst() as f64;
        changed = true;
    }

    let effective_burst = req.effective_burst();
    if effective_burst != item.burst {
        if effective_burst > item.remaining.floor() as u64 {
            item.remaining = effective_burst as f64;
        }
        item.burst = effective_burst;
        changed = true;
    }
    if item.limit != req.limit || item.duration != req.duration {
        item.limit = req.limit;
        item.duration = req.duration;
        changed = true;
    }

    // `cache_refresh_duration` is the time remaining until the end of the
    // Gregorian interval (or the raw policy duration, if not Gregorian-aligned);
    // it feeds only a possible `expire_at` refresh below, never `item.duration`
    // itself, which stays the last-observed policy duration.
    let (rate, cache_refresh_duration) = if req.behavior.contains(Behavior::DURATION_IS_GREGORIAN) {
        let full = gregorian_duration(now, req.duration)?;
        let remaining_until_end = gregorian_expiration(now, req.duration)?.saturating_sub(now);
        (rate_ms_per_unit(full, req.limit), remaining_until_end)
    } else {
        (rate_ms_per_unit(req.duration, req.limit), req.duration)
    };

    let elapsed = now.saturating_sub(item.updated_at);
    let leak = elapsed as f64 / rate;
    if leak.floor() > 0.0 {
        item.remaining += leak;
        item.updated_at = now;
        changed = true;
    }

    if item.remaining.floor() as u64 > item.burst {
        item.remaining = item.burst as f64;
        changed = true;
    }

    let remaining_floor = item.remaining.floor() as u64;
    let mut resp = RateLimitResp {
        status: Status::UnderLimit,
        limit: item.limit,
        remaining: remaining_floor,
        reset_time: reset_time_for(now, item.limit, remaining_floor, rate),
    };

    if remaining_floor == 0 {
        resp.status = Status::OverLimit;
        return Ok(finish(changed, item, resp));
    }

    if remaining_floor == req.hits {
        item.remaining -= req.hits as f64;
        resp.remaining = 0;
        resp.reset_time = reset_time_for(now, item.limit, 0, rate);
        return Ok(Outcome::Mutated {
            item,
            resp,
            expire_refresh: None,
        });
    }

    if req.hits > remaining_floor {
        resp.status = Status::OverLimit;
        return Ok(finish(changed, item, resp));
    }

    if req.hits == 0 {
        return Ok(finish(changed, item, resp));
    }

    item.remaining -= req.hits as f64;
    let new_remaining_floor = item.remaining.floor() as u64;
    resp.remaining = new_remaining_floor;
    resp.reset_time = reset_time_for(now, item.limit, new_remaining_floor, rate);
    Ok(Outcome::Mutated {
        item,
        resp,
        expire_refresh: Some(now + cache_refresh_duration),
    })
}

fn finish(changed: bool, item: LeakyBucketItem, resp: RateLimitResp) -> Outcome {
    if changed {
        Outcome::Mutated {
            item,
            resp,
            expire_refresh: None,
        }
    } else {
        Outcome::Unchanged { resp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Algorithm;

    fn req(limit: u64, duration: u64, hits: u64) -> RateLimitReq {
        RateLimitReq::new("k", Algorithm::LeakyBucket, limit, duration, hits)
    }

    #[test]
    fn fresh_under_limit() {
        let outcome = fresh(&req(10, 1000, 3), 0).unwrap();
        match outcome {
            Outcome::Mutated { item, resp, .. } => {
                assert_eq!(resp.status, Status::UnderLimit);
                assert_eq!(resp.remaining, 7);
                assert_eq!(item.remaining, 7.0);
                assert_eq!(item.burst, 10);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn fresh_over_burst_does_not_persist_consumption() {
        let outcome = fresh(&req(10, 1000, 11), 0).unwrap();
        match outcome {
            Outcome::Mutated { item, resp, .. } => {
                assert_eq!(resp.status, Status::OverLimit);
                assert_eq!(resp.remaining, 0);
                assert_eq!(item.remaining, 0.0);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn fresh_honors_explicit_burst_override() {
        let outcome = fresh(&req(10, 1000, 0).with_burst(25), 0).unwrap();
        match outcome {
            Outcome::Mutated { item, .. } => {
                assert_eq!(item.burst, 25);
                assert_eq!(item.remaining, 25.0);
            }
            _ => panic!("expected Mutated"),
        }
    }

    fn base_item() -> LeakyBucketItem {
        LeakyBucketItem {
            burst: 10,
            limit: 10,
            duration: 1000,
            remaining: 4.0,
            updated_at: 0,
        }
    }

    #[test]
    fn exact_drain_is_under_limit() {
        // no time elapsed, so no leak: remaining stays 4
        let outcome = existing(base_item(), &req(10, 1000, 4), 0).unwrap();
        match outcome {
            Outcome::Mutated { item, resp, .. } => {
                assert_eq!(resp.status, Status::UnderLimit);
                assert_eq!(resp.remaining, 0);
                assert_eq!(item.remaining, 0.0);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn over_remaining_does_not_consume() {
        let outcome = existing(base_item(), &req(10, 1000, 5), 0).unwrap();
        match outcome {
            Outcome::Unchanged { resp } => {
                assert_eq!(resp.status, Status::OverLimit);
            }
            Outcome::Mutated { resp, .. } => {
                assert_eq!(resp.status, Status::OverLimit);
            }
        }
    }

    #[test]
    fn leak_accrues_with_elapsed_time() {
        // rate = 1000ms / 10 units = 100ms/unit; 500ms elapsed => +5 units
        let outcome = existing(base_item(), &req(10, 1000, 0), 500).unwrap();
        match outcome {
            Outcome::Mutated { item, resp, .. } => {
                assert_eq!(resp.remaining, 9);
                assert_eq!(item.remaining, 9.0);
            }
            _ => panic!("expected Mutated due to leak progression"),
        }
    }

    #[test]
    fn leak_caps_at_burst() {
        let outcome = existing(base_item(), &req(10, 1000, 0), 10_000).unwrap();
        match outcome {
            Outcome::Mutated { item, resp, .. } => {
                assert_eq!(resp.remaining, 10);
                assert_eq!(item.remaining, 10.0);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn reset_remaining_is_non_destructive_and_continues_pipeline() {
        let outcome = existing(
            base_item(),
            &req(10, 1000, 3).with_behavior(Behavior::RESET_REMAINING),
            0,
        )
        .unwrap();
        match outcome {
            Outcome::Mutated { item, resp, .. } => {
                // reset to burst=10, then 3 hits consumed -> remaining=7
                assert_eq!(resp.status, Status::UnderLimit);
                assert_eq!(resp.remaining, 7);
                assert_eq!(item.remaining, 7.0);
            }
            _ => panic!("expected Mutated"),
        }
    }

    #[test]
    fn burst_raise_grants_capacity_immediately() {
        let outcome = existing(base_item(), &req(10, 1000, 0).with_burst(20), 0).unwrap();
        match outcome {
            Outcome::Mutated { item, resp, .. } => {
                assert_eq!(item.burst, 20);
                assert_eq!(item.remaining, 20.0);
                assert_eq!(resp.remaining, 20);
            }
            _ => panic!("expected Mutated"),
        }
    }
}
