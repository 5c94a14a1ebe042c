//! Rate Limiter: a per-client-IP token bucket. State is a single
//! lock-guarded map, refilled lazily on each check rather than by a
//! background task, mirroring how the session store treats its own clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
    pub retry_after_secs: u64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    enabled: bool,
    calls: u32,
    period: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            calls: config.calls,
            period: Duration::from_secs(config.period_secs.max(1)),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the client key from `X-Forwarded-For` (first element), else
    /// `X-Real-IP`, else the raw peer address string passed by the caller.
    pub fn client_key(forwarded_for: Option<&str>, real_ip: Option<&str>, peer: &str) -> String {
        if let Some(v) = forwarded_for {
            if let Some(first) = v.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        if let Some(v) = real_ip {
            if !v.trim().is_empty() {
                return v.trim().to_string();
            }
        }
        peer.to_string()
    }

    pub fn check(&self, client_key: &str) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision { allowed: true, limit: self.calls, remaining: self.calls, reset_secs: 0, retry_after_secs: 0 };
        }

        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        let refill_rate = self.calls as f64 / self.period.as_secs_f64();

        let bucket = buckets
            .entry(client_key.to_string())
            .or_insert_with(|| Bucket { tokens: self.calls as f64, last_refill: now });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill_rate).min(self.calls as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            let remaining = bucket.tokens.floor() as u32;
            RateLimitDecision {
                allowed: true,
                limit: self.calls,
                remaining,
                reset_secs: self.period.as_secs(),
                retry_after_secs: 0,
            }
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after_secs = (deficit / refill_rate).ceil() as u64;
            RateLimitDecision { allowed: false, limit: self.calls, remaining: 0, reset_secs: self.period.as_secs(), retry_after_secs }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(calls: u32, period_secs: u64) -> RateLimitConfig {
        RateLimitConfig { enabled: true, calls, period_secs }
    }

    #[test]
    fn allows_up_to_the_configured_burst() {
        let limiter = RateLimiter::new(&config(3, 60));
        for _ in 0..3 {
            assert!(limiter.check("1.2.3.4").allowed);
        }
        assert!(!limiter.check("1.2.3.4").allowed);
    }

    #[test]
    fn separate_clients_have_separate_buckets() {
        let limiter = RateLimiter::new(&config(1, 60));
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
        assert!(!limiter.check("a").allowed);
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(&RateLimitConfig { enabled: false, calls: 1, period_secs: 60 });
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("a").allowed);
    }

    #[test]
    fn client_key_prefers_forwarded_for_first_element() {
        let key = RateLimiter::client_key(Some("5.5.5.5, 6.6.6.6"), Some("9.9.9.9"), "127.0.0.1:1234");
        assert_eq!(key, "5.5.5.5");
    }

    #[test]
    fn client_key_falls_back_to_peer() {
        let key = RateLimiter::client_key(None, None, "127.0.0.1:1234");
        assert_eq!(key, "127.0.0.1:1234");
    }
}
