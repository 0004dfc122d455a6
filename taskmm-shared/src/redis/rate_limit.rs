/// Sliding-window request rate limiting
///
/// Each client key owns a sorted set `rate-limit:{key}` whose members are
/// request timestamps in milliseconds. A check atomically drops members older
/// than the window, records the current request, counts the set and refreshes
/// its expiry. The request is allowed while the count stays within the limit.
///
/// Denied requests are recorded too, so a client hammering the endpoint stays
/// limited until it backs off for a full window.

use crate::redis::client::{RedisClient, RedisClientError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Default number of requests allowed per window
pub const DEFAULT_MAX_REQUESTS: u64 = 50;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Rate limit errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The backing store could not be reached
    #[error("Rate limit store unavailable: {0}")]
    Store(#[from] RedisClientError),

    /// In-memory state was poisoned by a panicking thread
    #[error("Rate limit state poisoned")]
    Poisoned,
}

/// Limits applied to every key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Requests seen in the current window, this one included
    pub count: u64,

    /// Configured limit
    pub limit: u64,

    /// Seconds until the oldest request leaves the window
    pub retry_after_secs: u64,
}

impl RateLimitDecision {
    fn evaluate(config: &RateLimitConfig, count: u64, oldest_ms: Option<i64>, now_ms: i64) -> Self {
        let window_ms = config.window.as_millis() as i64;
        let retry_after_ms = oldest_ms
            .map(|oldest| (oldest + window_ms - now_ms).max(0))
            .unwrap_or(window_ms);

        Self {
            allowed: count <= config.max_requests,
            count,
            limit: config.max_requests,
            // Round up so clients never retry a moment too early
            retry_after_secs: ((retry_after_ms + 999) / 1000).max(1) as u64,
        }
    }
}

/// A store that counts requests per key
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one request for `key` and decides whether it is allowed
    async fn check(&self, key: &str) -> Result<RateLimitDecision, RateLimitError>;
}

fn redis_key(key: &str) -> String {
    format!("rate-limit:{}", key)
}

/// Rate limiter backed by Redis sorted sets, shared across API instances
#[derive(Clone)]
pub struct RedisRateLimiter {
    client: RedisClient,
    config: RateLimitConfig,
}

impl RedisRateLimiter {
    pub fn new(client: RedisClient, config: RateLimitConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitDecision, RateLimitError> {
        let key = redis_key(key);
        let now_ms = Utc::now().timestamp_millis();
        let window_ms = self.config.window.as_millis() as i64;

        // Timestamps collide under load; the suffix keeps members distinct
        let member = format!("{}-{}", now_ms, Uuid::new_v4().simple());

        let mut pipeline = redis::pipe();
        pipeline
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg(0)
            .arg(now_ms - window_ms)
            .ignore()
            .cmd("ZADD")
            .arg(&key)
            .arg(now_ms)
            .arg(&member)
            .ignore()
            .cmd("ZCARD")
            .arg(&key)
            .cmd("ZRANGE")
            .arg(&key)
            .arg(0)
            .arg(0)
            .arg("WITHSCORES")
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(window_ms)
            .ignore();

        let (count, oldest): (u64, Vec<(String, f64)>) =
            self.client.query_pipeline(&pipeline).await?;

        let oldest_ms = oldest.first().map(|(_, score)| *score as i64);
        let decision = RateLimitDecision::evaluate(&self.config, count, oldest_ms, now_ms);

        if !decision.allowed {
            tracing::warn!(key = %key, count, limit = decision.limit, "Rate limit exceeded");
        }

        Ok(decision)
    }
}

/// Process-local rate limiter with the same sliding-window semantics
///
/// Suitable for a single API instance and for tests.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<Windows>,
}

/// Per-key timestamps plus the time of the next stale-key sweep
#[derive(Default)]
struct Windows {
    entries: HashMap<String, VecDeque<i64>>,
    next_sweep_ms: i64,
}

impl Windows {
    /// Drops every key whose newest request has left the window
    ///
    /// Runs at most once per window so a check stays O(1) amortized.
    fn sweep(&mut self, now_ms: i64, window_ms: i64) {
        if now_ms < self.next_sweep_ms {
            return;
        }

        let cutoff = now_ms - window_ms;
        self.entries
            .retain(|_, entries| entries.back().is_some_and(|&ts| ts > cutoff));
        self.next_sweep_ms = now_ms + window_ms;
    }
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(Windows::default()),
        }
    }

    fn check_at(&self, key: &str, now_ms: i64) -> Result<RateLimitDecision, RateLimitError> {
        let window_ms = self.config.window.as_millis() as i64;
        let mut windows = self.windows.lock().map_err(|_| RateLimitError::Poisoned)?;
        windows.sweep(now_ms, window_ms);

        let entries = windows.entries.entry(redis_key(key)).or_default();
        while entries.front().is_some_and(|&ts| ts <= now_ms - window_ms) {
            entries.pop_front();
        }
        entries.push_back(now_ms);

        Ok(RateLimitDecision::evaluate(
            &self.config,
            entries.len() as u64,
            entries.front().copied(),
            now_ms,
        ))
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<RateLimitDecision, RateLimitError> {
        self.check_at(key, Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u64, window_secs: u64) -> InMemoryRateLimiter {
        InMemoryRateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 50);
        assert_eq!(config.window, Duration::from_secs(60));
    }

    #[test]
    fn test_allows_up_to_limit_then_denies() {
        let limiter = limiter(3, 60);
        let now = 1_000_000;

        for i in 1..=3 {
            let decision = limiter.check_at("10.0.0.1", now + i).unwrap();
            assert!(decision.allowed, "request {} should pass", i);
            assert_eq!(decision.count, i as u64);
        }

        let denied = limiter.check_at("10.0.0.1", now + 4).unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.count, 4);
        assert_eq!(denied.limit, 3);
        assert_eq!(denied.retry_after_secs, 60);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60);

        assert!(limiter.check_at("10.0.0.1", 1_000).unwrap().allowed);
        assert!(!limiter.check_at("10.0.0.1", 1_001).unwrap().allowed);
        assert!(limiter.check_at("10.0.0.2", 1_002).unwrap().allowed);
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2, 10);

        assert!(limiter.check_at("ip", 0).unwrap().allowed);
        assert!(limiter.check_at("ip", 5_000).unwrap().allowed);
        assert!(!limiter.check_at("ip", 6_000).unwrap().allowed);

        // The request at t=0 has left the window; t=5000 and t=6000 remain
        let decision = limiter.check_at("ip", 10_500).unwrap();
        assert_eq!(decision.count, 3);
        assert!(!decision.allowed);

        // Past t=16000 only the request at t=10500 and this one remain
        let decision = limiter.check_at("ip", 16_001).unwrap();
        assert_eq!(decision.count, 2);
        assert!(decision.allowed);
    }

    #[test]
    fn test_idle_clients_are_forgotten() {
        let limiter = limiter(5, 10);
        let tracked =
            |limiter: &InMemoryRateLimiter| limiter.windows.lock().unwrap().entries.len();

        for i in 0..100 {
            limiter.check_at(&format!("10.0.0.{}", i), 1_000).unwrap();
        }
        assert_eq!(tracked(&limiter), 100);

        // Still inside the window: nothing is dropped
        limiter.check_at("10.0.1.1", 10_999).unwrap();
        assert_eq!(tracked(&limiter), 101);

        // Every earlier client has gone quiet for a full window
        limiter.check_at("10.0.1.1", 21_000).unwrap();
        assert_eq!(tracked(&limiter), 1);

        // A returning client starts a fresh window
        let decision = limiter.check_at("10.0.0.1", 21_001).unwrap();
        assert_eq!(decision.count, 1);
        assert_eq!(tracked(&limiter), 2);
    }

    #[test]
    fn test_retry_after_tracks_oldest_entry() {
        let config = RateLimitConfig {
            max_requests: 1,
            window: Duration::from_secs(60),
        };

        let decision = RateLimitDecision::evaluate(&config, 2, Some(0), 30_000);
        assert_eq!(decision.retry_after_secs, 30);

        let decision = RateLimitDecision::evaluate(&config, 2, Some(0), 59_999);
        assert_eq!(decision.retry_after_secs, 1);
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_redis_rate_limiter() {
        use crate::redis::client::RedisConfig;

        let client = RedisClient::new(RedisConfig::local()).await.unwrap();
        let limiter = RedisRateLimiter::new(
            client,
            RateLimitConfig {
                max_requests: 2,
                window: Duration::from_secs(5),
            },
        );
        let key = format!("test-{}", Uuid::new_v4());

        assert!(limiter.check(&key).await.unwrap().allowed);
        assert!(limiter.check(&key).await.unwrap().allowed);
        assert!(!limiter.check(&key).await.unwrap().allowed);
    }
}
