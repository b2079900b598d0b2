//! Sliding-Window Rate Limiter
//!
//! Per-key request counter over a sliding time window. State is
//! process-local; a multi-instance deployment must swap the storage for a
//! shared atomically-incrementable counter with expiry while keeping the
//! same `check(key) -> bool` contract.

use dashmap::DashMap;

/// Per-endpoint limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }
}

/// Exchange redemption: 5 requests / 60 s per member.
pub const EXCHANGE_LIMIT: RateLimitConfig = RateLimitConfig::new(5, 60);
/// Login bonus claim: 3 requests / 60 s per member.
pub const LOGIN_BONUS_LIMIT: RateLimitConfig = RateLimitConfig::new(3, 60);
/// OTP send: 3 requests / 300 s per email. Wired by the external auth layer.
pub const OTP_SEND_LIMIT: RateLimitConfig = RateLimitConfig::new(3, 300);
/// OTP verify: 5 requests / 300 s per email. Wired by the external auth layer.
pub const OTP_VERIFY_LIMIT: RateLimitConfig = RateLimitConfig::new(5, 300);

/// Sliding-window counter keyed by an arbitrary string (member id, email).
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    hits: DashMap<String, Vec<i64>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hits: DashMap::new(),
        }
    }

    /// Record a request for `key`. Returns false when the window is full;
    /// rejected requests are not recorded.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, shared::util::now_millis())
    }

    /// Same as [`check`](Self::check) with an explicit clock, for tests.
    pub fn check_at(&self, key: &str, now_ms: i64) -> bool {
        let window_ms = self.config.window_seconds as i64 * 1000;
        let mut entry = self.hits.entry(key.to_string()).or_default();
        entry.retain(|t| now_ms - *t < window_ms);
        if entry.len() >= self.config.max_requests as usize {
            return false;
        }
        entry.push(now_ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_then_blocks() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig::new(3, 60));
        assert!(limiter.check_at("m1", 1_000));
        assert!(limiter.check_at("m1", 2_000));
        assert!(limiter.check_at("m1", 3_000));
        assert!(!limiter.check_at("m1", 4_000));
        // Other keys are unaffected.
        assert!(limiter.check_at("m2", 4_000));
    }

    #[test]
    fn window_slides_and_frees_capacity() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig::new(2, 60));
        assert!(limiter.check_at("k", 0));
        assert!(limiter.check_at("k", 30_000));
        assert!(!limiter.check_at("k", 59_999));
        // First hit falls out of the window at t = 60 s.
        assert!(limiter.check_at("k", 60_000));
        assert!(!limiter.check_at("k", 60_001));
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig::new(1, 60));
        assert!(limiter.check_at("k", 0));
        for t in (1_000..59_000).step_by(10_000) {
            assert!(!limiter.check_at("k", t));
        }
        assert!(limiter.check_at("k", 60_000));
    }
}
