//! The response type the decision core returns.

use crate::request::Status;
use serde::{Deserialize, Serialize};

/// The outcome of a single [`crate::dispatcher::Dispatcher::decide`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResp {
    /// Whether the request was under or over the limit.
    pub status: Status,
    /// Echo of the request's `limit`.
    pub limit: u64,
    /// Remaining allowance after this call.
    pub remaining: u64,
    /// Absolute milliseconds-since-epoch when allowance is next expected to be
    /// at least 1 under current parameters; `0` if reset semantics don't apply
    /// (e.g. a `RESET_REMAINING` request just completed).
    pub reset_time: u64,
}

impl RateLimitResp {
    /// Returns whether the request was allowed.
    pub fn is_under_limit(&self) -> bool {
        matches!(self.status, Status::UnderLimit)
    }
}
