//! Rate limiting utilities

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{ClientId, MonotonicInstant};

/// Simple token-bucket rate limiter for control-socket clients
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum tokens (requests) per bucket
    max_tokens: u32,
    /// How often tokens are replenished
    refill_interval: Duration,
    /// Per-client state
    clients: HashMap<ClientId, ClientBucket>,
}

#[derive(Debug)]
struct ClientBucket {
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests allowed per interval
    /// * `interval` - Time interval for the limit
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_tokens: max_requests,
            refill_interval: interval,
            clients: HashMap::new(),
        }
    }

    /// Check if a request should be allowed for the given client
    ///
    /// Returns `true` if allowed, `false` if rate limited
    pub fn check(&mut self, client_id: &ClientId) -> bool {
        let now = Instant::now();

        let bucket = self.clients.entry(client_id.clone()).or_insert(ClientBucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        if elapsed >= self.refill_interval {
            let intervals = (elapsed.as_millis() / self.refill_interval.as_millis()) as u32;
            bucket.tokens = (bucket.tokens + intervals * self.max_tokens).min(self.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Remove a client's rate limit state
    pub fn remove_client(&mut self, client_id: &ClientId) {
        self.clients.remove(client_id);
    }
}

/// Minimum-interval gate for outbound publishes of a single value.
///
/// The first acquisition always succeeds; later ones succeed only once
/// `min_interval` has passed since the last successful one.
#[derive(Debug, Clone)]
pub struct PublishThrottle {
    min_interval: Duration,
    last_allowed: Option<MonotonicInstant>,
}

impl PublishThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_allowed: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether a publish at `now` would be allowed
    pub fn is_ready(&self, now: MonotonicInstant) -> bool {
        match self.last_allowed {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        }
    }

    /// Take the publish slot if it is free
    pub fn try_acquire(&mut self, now: MonotonicInstant) -> bool {
        if self.is_ready(now) {
            self.last_allowed = Some(now);
            true
        } else {
            false
        }
    }

    /// Record a publish that bypassed the gate (e.g. the full state push on connect)
    pub fn mark(&mut self, now: MonotonicInstant) {
        self.last_allowed = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        let client = ClientId::new();

        for _ in 0..5 {
            assert!(limiter.check(&client));
        }

        assert!(!limiter.check(&client));
    }

    #[test]
    fn test_rate_limiter_different_clients() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        let client1 = ClientId::new();
        let client2 = ClientId::new();

        assert!(limiter.check(&client1));
        assert!(limiter.check(&client1));
        assert!(!limiter.check(&client1));

        assert!(limiter.check(&client2));
        assert!(limiter.check(&client2));
    }

    #[test]
    fn test_throttle_first_publish_is_free() {
        let mut throttle = PublishThrottle::new(Duration::from_secs(60));
        assert!(throttle.try_acquire(MonotonicInstant::now()));
    }

    #[test]
    fn test_throttle_blocks_inside_window() {
        let mut throttle = PublishThrottle::new(Duration::from_secs(60));
        let t0 = MonotonicInstant::now();

        assert!(throttle.try_acquire(t0));
        assert!(!throttle.try_acquire(t0 + Duration::from_secs(30)));
        assert!(!throttle.is_ready(t0 + Duration::from_secs(59)));
        assert!(throttle.try_acquire(t0 + Duration::from_secs(60)));
        assert!(!throttle.try_acquire(t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_throttle_mark_restarts_window() {
        let mut throttle = PublishThrottle::new(Duration::from_secs(10));
        let t0 = MonotonicInstant::now();

        throttle.mark(t0);
        assert!(!throttle.is_ready(t0 + Duration::from_secs(5)));
        assert!(throttle.is_ready(t0 + Duration::from_secs(10)));
    }
}
