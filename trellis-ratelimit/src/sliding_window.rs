//! Sliding Window Log Algorithm
//!
//! Tracks the timestamp of every accepted request per bucket. A request is
//! accepted when fewer than `max_requests` timestamps fall inside the last
//! `window`; rejected requests are not logged.
//!
//! ## Example
//!
//! ```rust
//! use trellis_ratelimit::{Limit, SlidingWindowLog};
//! use std::time::Duration;
//!
//! let log = SlidingWindowLog::new();
//! let limit = Limit::new(5, Duration::from_secs(60)).unwrap();
//!
//! for _ in 0..5 {
//!     assert!(log.try_acquire("10.0.0.1:api", limit).allowed);
//! }
//! assert!(!log.try_acquire("10.0.0.1:api", limit).allowed);
//! ```

use crate::config::Limit;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Outcome of one acquire attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Time until the oldest logged request leaves the window. Zero when
    /// the bucket is empty.
    pub retry_after: Duration,
}

/// Request timestamps per bucket key
#[derive(Debug)]
pub struct SlidingWindowLog {
    logs: DashMap<String, VecDeque<Instant>>,
    started: Instant,
    /// Milliseconds after `started` of the last idle-bucket sweep.
    last_sweep_ms: AtomicU64,
}

impl Default for SlidingWindowLog {
    fn default() -> Self {
        Self {
            logs: DashMap::new(),
            started: Instant::now(),
            last_sweep_ms: AtomicU64::new(0),
        }
    }
}

fn evict(entry: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    // A timestamp exactly `window` old has left the window.
    while let Some(front) = entry.front() {
        if now.saturating_duration_since(*front) >= window {
            entry.pop_front();
        } else {
            break;
        }
    }
}

impl SlidingWindowLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request under `key` if the limit allows it.
    pub fn try_acquire(&self, key: &str, limit: Limit) -> Decision {
        let now = Instant::now();
        let mut entry = self.logs.entry(key.to_string()).or_default();
        evict(&mut entry, now, limit.window);

        let count = entry.len() as u64;
        let allowed = count < limit.max_requests;
        if allowed {
            entry.push_back(now);
        }

        let retry_after = entry
            .front()
            .map(|oldest| limit.window.saturating_sub(now.saturating_duration_since(*oldest)))
            .unwrap_or_default();
        let remaining = limit.max_requests.saturating_sub(entry.len() as u64);

        trace!(key = %key, allowed, remaining, "Sliding window check");
        Decision {
            allowed,
            limit: limit.max_requests,
            remaining,
            retry_after,
        }
    }

    /// Requests still available under `key` without recording one.
    pub fn remaining(&self, key: &str, limit: Limit) -> u64 {
        let now = Instant::now();
        match self.logs.get_mut(key) {
            Some(mut entry) => {
                evict(&mut entry, now, limit.window);
                limit.max_requests.saturating_sub(entry.len() as u64)
            }
            None => limit.max_requests,
        }
    }

    pub fn reset(&self, key: &str) {
        self.logs.remove(key);
    }

    /// Drop buckets whose newest request is older than `window`.
    pub fn cleanup(&self, window: Duration) -> usize {
        let now = Instant::now();
        let before = self.logs.len();
        self.logs.retain(|_, entry| {
            entry
                .back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < window)
        });
        before - self.logs.len()
    }

    /// Run `cleanup(window)` if no sweep has happened during the last
    /// `window`. Returns the number of buckets dropped.
    ///
    /// Concurrent callers race on a compare-exchange so only one sweeps.
    pub fn sweep_idle(&self, window: Duration) -> usize {
        let now_ms = self.started.elapsed().as_millis() as u64;
        let last = self.last_sweep_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < window.as_millis() as u64 {
            return 0;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return 0;
        }

        let dropped = self.cleanup(window);
        if dropped > 0 {
            trace!(dropped, remaining = self.logs.len(), "Idle rate limit buckets dropped");
        }
        dropped
    }

    /// Number of tracked buckets
    pub fn key_count(&self) -> usize {
        self.logs.len()
    }
}
