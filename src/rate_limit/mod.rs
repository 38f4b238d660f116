// Per-client request rate limiting for the token API.
//
// One token bucket per client address, refilled continuously at
// limit/60 tokens per second. State is in-memory only (resets on restart).

use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Token bucket for a single client.
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u64) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    /// Try to consume one token. Refills based on elapsed time at rate = capacity/60 tokens/sec.
    fn try_consume(&mut self, capacity: u64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let refill_rate = capacity as f64 / 60.0;
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Client key for a request. Requests without a known peer address share one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKey {
    Addr(IpAddr),
    Unknown,
}

/// Per-client token bucket rate limiter.
///
/// Buckets are created lazily on a client's first request.
pub struct RateLimiter {
    buckets: DashMap<ClientKey, TokenBucket>,
    limit_per_minute: u64,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u64) -> Self {
        Self {
            buckets: DashMap::new(),
            limit_per_minute,
        }
    }

    pub fn limit_per_minute(&self) -> u64 {
        self.limit_per_minute
    }

    /// Check and consume one token for `client`.
    ///
    /// Returns true if the request is allowed, false if rate limit exceeded.
    pub fn check_and_consume(&self, client: ClientKey) -> bool {
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.limit_per_minute));
        bucket.try_consume(self.limit_per_minute)
    }

    /// Drops buckets untouched for longer than `max_idle`. Returns how many were removed.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_refill.elapsed() < max_idle);
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Background task to periodically prune idle buckets
pub async fn run_bucket_cleanup(limiter: std::sync::Arc<RateLimiter>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        let removed = limiter.prune_idle(Duration::from_secs(interval_seconds));
        tracing::debug!(
            "Rate limit cleanup complete, {} buckets removed, {} remaining",
            removed,
            limiter.tracked_clients()
        );
    }
}
