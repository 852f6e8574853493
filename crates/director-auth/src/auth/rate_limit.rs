use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Per-key request limiter shared by the auth endpoints.
///
/// Implementations must be safe to call from many tasks at once.
pub trait RateLimiter: Send + Sync {
    /// Count a request for `key` and decide whether it may proceed.
    /// Rejected requests are not counted.
    fn check_and_increment(&self, key: &str) -> RateLimitDecision;

    /// Forget everything recorded for `key`.
    fn reset(&self, key: &str);

    /// Drop state that no longer affects any decision.
    fn cleanup(&self);
}

/// In-memory sliding-window rate limiter.
///
/// Tracks request instants per key (client IP) and rejects once
/// `max_requests` fall inside `window`.
pub struct SlidingWindowLimiter {
    max_requests: u32,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Create a new rate limiter.
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn hits(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.hits().len()
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check_and_increment(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut map = self.hits();
        let entries = map.entry(key.to_string()).or_default();

        while entries
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            entries.pop_front();
        }

        if entries.len() >= self.max_requests as usize {
            let retry_after = entries
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return RateLimitDecision::Limited {
                retry_after_secs: retry_after.as_secs().max(1),
            };
        }

        entries.push_back(now);
        RateLimitDecision::Allowed {
            remaining: self.max_requests - entries.len() as u32,
        }
    }

    fn reset(&self, key: &str) {
        self.hits().remove(key);
    }

    fn cleanup(&self) {
        let now = Instant::now();
        self.hits().retain(|_, entries| {
            entries.retain(|t| now.duration_since(*t) < self.window);
            !entries.is_empty()
        });
    }
}
