/// Redis integration
///
/// - [`client`]: connection manager with connect and command timeouts
/// - [`rate_limit`]: sliding-window request limiter
///
/// The token blocklist lives in [`crate::auth::revocation`] and shares the
/// same client.
///
/// # Keys
///
/// ```text
/// blocklist:{jti}      revoked token id, expires with the token
/// rate-limit:{ip}      sorted set of request timestamps (ms)
/// ```
///
/// # Example
///
/// ```no_run
/// use taskmm_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RedisClient::new(RedisConfig::local()).await?;
///
/// let healthy = client.ping().await?;
/// println!("Redis healthy: {}", healthy);
/// # Ok(())
/// # }
/// ```

pub mod client;
pub mod rate_limit;
