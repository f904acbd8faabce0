//! Sliding window rate limiting algorithm
//!
//! Tracks the timestamps of admitted calls and admits a new call only while
//! fewer than `limit` of them fall inside the trailing window. The window is
//! half-open: an entry exactly `window` old has already expired.

use super::Admission;
use std::collections::VecDeque;
use std::time::Duration;

/// Server-side form of [`SlidingWindow::evaluate`], run atomically by Redis.
///
/// KEYS[1] = window key
/// ARGV = limit, window in ms, now in ms, unique member id
///
/// Returns `{admitted (0|1), retry_after_ms, count}`.
pub const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window_ms)
local count = redis.call('ZCARD', key)

if count < limit then
    redis.call('ZADD', key, now, ARGV[3] .. ':' .. ARGV[4])
    redis.call('PEXPIRE', key, window_ms)
    return {1, 0, count + 1}
end

local oldest = tonumber(redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')[2])
local wait = oldest + window_ms - now
if wait < 0 then
    wait = 0
end
return {0, wait, count}
"#;

/// Longest window a limiter accepts. `now + window` then stays exact in the
/// double arithmetic of [`SLIDING_WINDOW_SCRIPT`].
pub const MAX_WINDOW: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Whole milliseconds in `window`, saturating at `u64::MAX`.
pub fn window_millis(window: Duration) -> u64 {
    u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
}

/// Pure sliding window decision logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindow {
    limit: u64,
    window_ms: u64,
}

impl SlidingWindow {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window_ms: window_millis(window),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Drop every entry that is `window` or more older than `now_ms`.
    pub fn prune(&self, timestamps: &mut VecDeque<u64>, now_ms: u64) {
        let Some(cutoff) = now_ms.checked_sub(self.window_ms) else {
            return;
        };
        while timestamps.front().is_some_and(|&ts| ts <= cutoff) {
            timestamps.pop_front();
        }
    }

    /// Evaluate one admission request against `timestamps`, recording
    /// `now_ms` when admitted. `timestamps` stays sorted ascending.
    pub fn evaluate(&self, timestamps: &mut VecDeque<u64>, now_ms: u64) -> Admission {
        self.prune(timestamps, now_ms);

        let count = timestamps.len() as u64;
        if count < self.limit {
            // Entries recorded by a clock slightly ahead of ours still sort correctly
            let at = timestamps.partition_point(|&ts| ts <= now_ms);
            timestamps.insert(at, now_ms);
            return Admission::admitted(count + 1);
        }

        let retry_after_ms = timestamps
            .front()
            .map(|&oldest| oldest.saturating_add(self.window_ms).saturating_sub(now_ms))
            .unwrap_or(0);
        Admission::denied(retry_after_ms, count)
    }
}
