//! Per-identifier request throttling.
//!
//! The server only talks to the [`RateLimiter`] trait; the in-memory
//! [`TokenBucketLimiter`] is the default implementation.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

/// Answer of a limiter for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the window the decision belongs to ends.
    pub reset_after: Duration,
}

impl RateDecision {
    /// Whole seconds a denied client should wait, never zero.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 || secs == 0 {
            secs + 1
        } else {
            secs
        }
    }
}

pub trait RateLimiter: Send + Sync {
    /// Consume one request for `identifier`.
    fn check(&self, identifier: &str) -> RateDecision;

    /// Drop state not used for longer than `idle`. Returns how many entries
    /// were removed.
    fn sweep(&self, idle: Duration) -> usize;
}

#[derive(Clone, Copy, Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket per identifier.
///
/// A bucket holds at most `max_requests` tokens and regains them
/// proportionally to the time elapsed, `max_requests` per `interval`.
#[derive(Debug)]
pub struct TokenBucketLimiter {
    max_requests: u32,
    interval: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketLimiter {
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_requests,
            interval,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn check_at(&self, identifier: &str, now: Instant) -> RateDecision {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(bucket) = buckets.get_mut(identifier) else {
            let bucket = Bucket {
                tokens: self.max_requests.saturating_sub(1),
                last_refill: now,
            };
            buckets.insert(identifier.to_string(), bucket);
            return RateDecision {
                allowed: self.max_requests > 0,
                limit: self.max_requests,
                remaining: bucket.tokens,
                reset_after: self.interval,
            };
        };

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = self.refill_tokens(elapsed);
        if refill > 0 {
            bucket.tokens = bucket.tokens.saturating_add(refill).min(self.max_requests);
            bucket.last_refill = now;
        }

        let reset_after = self
            .interval
            .saturating_sub(now.saturating_duration_since(bucket.last_refill));
        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            RateDecision {
                allowed: true,
                limit: self.max_requests,
                remaining: bucket.tokens,
                reset_after,
            }
        } else {
            RateDecision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_after,
            }
        }
    }

    /// `floor(elapsed / interval * max_requests)`, saturated.
    fn refill_tokens(&self, elapsed: Duration) -> u32 {
        let interval = self.interval.as_nanos();
        if interval == 0 {
            return self.max_requests;
        }
        let tokens = elapsed.as_nanos() * u128::from(self.max_requests) / interval;
        u32::try_from(tokens).unwrap_or(u32::MAX)
    }

    pub(crate) fn sweep_at(&self, idle: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) <= idle);
        before - buckets.len()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn check(&self, identifier: &str) -> RateDecision {
        self.check_at(identifier, Instant::now())
    }

    fn sweep(&self, idle: Duration) -> usize {
        self.sweep_at(idle, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_takes_one_token() {
        let limiter = TokenBucketLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        let decision = limiter.check_at("user:alice", now);
        assert!(decision.allowed);
        assert_eq!(decision.limit, 3);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_after, Duration::from_secs(60));
    }

    #[test]
    fn bucket_runs_dry_then_refills_proportionally() {
        let limiter = TokenBucketLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("user:alice", start).allowed);
        }
        let denied = limiter.check_at("user:alice", start + Duration::from_secs(10));
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_after, Duration::from_secs(50));
        assert_eq!(denied.retry_after_secs(), 50);

        // 20s is a third of the interval: one token back.
        let allowed = limiter.check_at("user:alice", start + Duration::from_secs(20));
        assert!(allowed.allowed);
        assert_eq!(allowed.remaining, 0);
        assert!(!limiter.check_at("user:alice", start + Duration::from_secs(21)).allowed);
    }

    #[test]
    fn refill_never_exceeds_the_limit() {
        let limiter = TokenBucketLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();
        limiter.check_at("k", start);

        let later = limiter.check_at("k", start + Duration::from_secs(3600));
        assert_eq!(later.remaining, 1);
    }

    #[test]
    fn identifiers_have_separate_buckets() {
        let limiter = TokenBucketLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at("user:alice", now).allowed);
        assert!(!limiter.check_at("user:alice", now).allowed);
        assert!(limiter.check_at("user:bob", now).allowed);
    }

    #[test]
    fn sweep_drops_idle_buckets() {
        let limiter = TokenBucketLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("fresh", start + Duration::from_secs(3000));

        let removed = limiter.sweep_at(Duration::from_secs(3600), start + Duration::from_secs(3601));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn retry_after_rounds_up() {
        let decision = RateDecision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_after: Duration::from_millis(1500),
        };
        assert_eq!(decision.retry_after_secs(), 2);
    }
}
