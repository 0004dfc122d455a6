/// Token revocation (blocklist) store
///
/// A revoked token id (jti) is recorded with a time-to-live. While the entry
/// exists the token is rejected, even though its signature and expiry would
/// still verify. Entries vanish on their own once the TTL elapses, which
/// should match the token's remaining lifetime.
///
/// Store failures are always surfaced as errors. A lookup that cannot reach
/// the store never reports a token as "not revoked".

use crate::redis::client::{RedisClient, RedisClientError};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// TTL used when a token's remaining lifetime is unknown
pub const DEFAULT_REVOCATION_TTL_SECS: u64 = 3600;

/// Revocation store errors
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    /// The backing store could not be reached or rejected the command
    #[error("Revocation store error: {0}")]
    Store(#[from] RedisClientError),

    /// In-memory state was poisoned by a panicking thread
    #[error("Revocation store state poisoned")]
    Poisoned,
}

/// Seconds a revocation entry must live to outlast a token with
/// `remaining` lifetime; never less than one second.
pub fn revocation_ttl(remaining: Option<Duration>) -> u64 {
    match remaining {
        Some(left) => left.num_seconds().max(1) as u64,
        None => DEFAULT_REVOCATION_TTL_SECS,
    }
}

/// Storage for revoked token ids
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Blocks `jti` for `ttl_secs` seconds; revoking twice is harmless
    async fn revoke(&self, jti: &str, ttl_secs: u64) -> Result<(), RevocationError>;

    /// Whether `jti` is currently blocked
    async fn is_revoked(&self, jti: &str) -> Result<bool, RevocationError>;

    /// Removes `jti` from the blocklist
    async fn unrevoke(&self, jti: &str) -> Result<(), RevocationError>;
}

fn blocklist_key(jti: &str) -> String {
    format!("blocklist:{}", jti)
}

/// Blocklist kept in Redis, shared by every API instance
#[derive(Clone)]
pub struct RedisRevocationStore {
    client: RedisClient,
}

impl RedisRevocationStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, jti: &str, ttl_secs: u64) -> Result<(), RevocationError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(blocklist_key(jti)).arg("").arg("EX").arg(ttl_secs.max(1));

        let _: () = self.client.query(cmd).await?;
        tracing::info!(jti = %jti, ttl_secs, "Token revoked");
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, RevocationError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(blocklist_key(jti));

        let count: i64 = self.client.query(cmd).await?;
        Ok(count > 0)
    }

    async fn unrevoke(&self, jti: &str) -> Result<(), RevocationError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(blocklist_key(jti));

        let _: i64 = self.client.query(cmd).await?;
        Ok(())
    }
}

/// Process-local blocklist
///
/// Expired entries are pruned lazily on access. Only suitable when a single
/// API instance serves all traffic.
#[derive(Default)]
pub struct InMemoryRevocationStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, jti: &str, ttl_secs: u64) -> Result<(), RevocationError> {
        let expires_at = Instant::now() + std::time::Duration::from_secs(ttl_secs.max(1));
        let mut entries = self.entries.lock().map_err(|_| RevocationError::Poisoned)?;

        let now = Instant::now();
        entries.retain(|_, expiry| *expiry > now);
        entries.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, RevocationError> {
        let entries = self.entries.lock().map_err(|_| RevocationError::Poisoned)?;
        Ok(entries
            .get(jti)
            .is_some_and(|expiry| *expiry > Instant::now()))
    }

    async fn unrevoke(&self, jti: &str) -> Result<(), RevocationError> {
        let mut entries = self.entries.lock().map_err(|_| RevocationError::Poisoned)?;
        entries.remove(jti);
        Ok(())
    }
}
