//! In-memory sliding-window rate limiter.
//!
//! Uses [`std::time::Instant`] rather than wall-clock time so limits are
//! immune to clock adjustments. Per-sender and per-recipient limiters are
//! separate instances of this same counter held by the routing core.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct SlidingWindowCounter {
    limit: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowCounter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `key` is under the limit, recording this call as a
    /// new event in that case. `limit_override` lets callers apply an
    /// adaptive per-sender limit (e.g. from reputation tier) without
    /// maintaining a separate counter per tier.
    pub fn check(&self, key: &str, limit_override: Option<u32>) -> bool {
        let effective_limit = limit_override.unwrap_or(self.limit);
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);

        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.to_string()).or_default();
        bucket.retain(|ts| *ts > cutoff);

        if bucket.len() as u32 >= effective_limit {
            return false;
        }
        bucket.push(now);
        true
    }

    pub fn remaining(&self, key: &str, limit_override: Option<u32>) -> u32 {
        let effective_limit = limit_override.unwrap_or(self.limit);
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);

        let buckets = self.buckets.lock().unwrap();
        let current = buckets
            .get(key)
            .map(|bucket| bucket.iter().filter(|ts| **ts > cutoff).count() as u32)
            .unwrap_or(0);
        effective_limit.saturating_sub(current)
    }

    /// Drop keys with no events inside the current window, bounding memory
    /// growth for a relay with many short-lived senders.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);
        let mut buckets = self.buckets.lock().unwrap();
        buckets.retain(|_, bucket| bucket.iter().any(|ts| *ts > cutoff));
    }

    pub fn total_keys(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let counter = SlidingWindowCounter::new(2, Duration::from_secs(60));
        assert!(counter.check("alice", None));
        assert!(counter.check("alice", None));
        assert!(!counter.check("alice", None));
    }

    #[test]
    fn limit_override_applies_per_call() {
        let counter = SlidingWindowCounter::new(2, Duration::from_secs(60));
        assert!(counter.check("bob", Some(1)));
        assert!(!counter.check("bob", Some(1)));
    }

    #[test]
    fn remaining_reflects_consumed_quota() {
        let counter = SlidingWindowCounter::new(5, Duration::from_secs(60));
        counter.check("carol", None);
        counter.check("carol", None);
        assert_eq!(counter.remaining("carol", None), 3);
    }

    #[test]
    fn cleanup_drops_keys_outside_the_window() {
        let counter = SlidingWindowCounter::new(5, Duration::from_millis(10));
        counter.check("dana", None);
        std::thread::sleep(Duration::from_millis(20));
        counter.cleanup();
        assert_eq!(counter.total_keys(), 0);
    }
}
