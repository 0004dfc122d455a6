/// Configuration management for the API server
///
/// Configuration is read once at startup from environment variables (a
/// `.env` file is loaded first when present) and shared as `Arc<Config>`.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `API_PREFIX`: prefix of every versioned route (default: /api/v1)
/// - `PRODUCTION`: enables HSTS (default: false)
/// - `CORS_ALLOWED_ORIGINS`, `CORS_ALLOWED_METHODS`, `CORS_ALLOWED_HEADERS`:
///   comma lists (default: *)
/// - `CORS_ALLOW_CREDENTIALS` (default: false)
/// - `TRUSTED_HOSTS`: comma list, `*` or `*.example.com` patterns (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS` (default: 10)
/// - `DATABASE_RUN_MIGRATIONS` (default: true)
/// - `DATABASE_SEED` (default: false)
/// - `REDIS_URL` (required), `REDIS_CONNECTION_TIMEOUT_SECS` (default: 5),
///   `REDIS_COMMAND_TIMEOUT_SECS` (default: 2)
/// - `JWT_SECRET`: signing secret, at least 32 characters (required)
/// - `JWT_ALGORITHM`: HS256, HS384 or HS512 (default: HS256)
/// - `ACCESS_TOKEN_EXPIRE_MINUTES` (default: 60)
/// - `REFRESH_TOKEN_EXPIRE_DAYS` (default: 7)
/// - `RATE_LIMIT_REQUESTS` (default: 50), `RATE_LIMIT_WINDOW_SECS` (default: 60)
/// - `RATE_LIMIT_FAIL_OPEN`: let requests through when Redis is down (default: false)
/// - `RUST_LOG`, `LOG_FORMAT` (`json` or `pretty`): read by `main`
///
/// # Example
///
/// ```no_run
/// use taskmm_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use taskmm_shared::auth::jwt::TokenCodec;
use taskmm_shared::db::pool::DatabaseConfig as PoolConfig;
use taskmm_shared::redis::client::RedisConfig;
use taskmm_shared::redis::rate_limit::RateLimitConfig;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub redis: RedisSettings,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Prefix of the versioned routes, e.g. `/api/v1`
    pub prefix: String,

    /// Production mode turns on HSTS
    pub production: bool,

    pub cors: CorsConfig,

    /// Accepted `Host` header values
    pub trusted_hosts: Vec<String>,
}

/// Cross-origin settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,

    /// Apply pending migrations at startup
    pub run_migrations: bool,

    /// Insert demo data at startup when the database is empty
    pub seed: bool,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    pub connection_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
}

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests allowed per client within one window
    pub requests: u64,
    pub window_secs: u64,

    /// Let requests through when the limiter store is unreachable
    pub fail_open: bool,
}

/// Parses `key`, falling back to `default` when unset
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
}

/// Splits a comma list, defaulting to `*`
fn list(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Vec<String> {
    let items: Vec<String> = lookup(key)
        .unwrap_or_default()
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        vec!["*".to_string()]
    } else {
        items
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, the JWT secret is shorter than 32 characters or the JWT
    /// algorithm is not HMAC-based.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = required(&lookup, "JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let algorithm = lookup("JWT_ALGORITHM").unwrap_or_else(|| "HS256".to_string());
        TokenCodec::parse_algorithm(&algorithm)?;

        let mut prefix = lookup("API_PREFIX").unwrap_or_else(|| "/api/v1".to_string());
        if !prefix.is_empty() && !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        let prefix = prefix.trim_end_matches('/').to_string();

        let rate_limit = RateLimitSettings {
            requests: parse_or(&lookup, "RATE_LIMIT_REQUESTS", 50)?,
            window_secs: parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 60)?,
            fail_open: parse_or(&lookup, "RATE_LIMIT_FAIL_OPEN", false)?,
        };
        if rate_limit.requests == 0 || rate_limit.window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_REQUESTS and RATE_LIMIT_WINDOW_SECS must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "API_PORT", 8080)?,
                prefix,
                production: parse_or(&lookup, "PRODUCTION", false)?,
                cors: CorsConfig {
                    allowed_origins: list(&lookup, "CORS_ALLOWED_ORIGINS"),
                    allowed_methods: list(&lookup, "CORS_ALLOWED_METHODS"),
                    allowed_headers: list(&lookup, "CORS_ALLOWED_HEADERS"),
                    allow_credentials: parse_or(&lookup, "CORS_ALLOW_CREDENTIALS", false)?,
                },
                trusted_hosts: list(&lookup, "TRUSTED_HOSTS"),
            },
            database: DatabaseConfig {
                url: required(&lookup, "DATABASE_URL")?,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                run_migrations: parse_or(&lookup, "DATABASE_RUN_MIGRATIONS", true)?,
                seed: parse_or(&lookup, "DATABASE_SEED", false)?,
            },
            redis: RedisSettings {
                url: required(&lookup, "REDIS_URL")?,
                connection_timeout_secs: parse_or(&lookup, "REDIS_CONNECTION_TIMEOUT_SECS", 5)?,
                command_timeout_secs: parse_or(&lookup, "REDIS_COMMAND_TIMEOUT_SECS", 2)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                algorithm,
                access_token_expire_minutes: parse_or(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", 60)?,
                refresh_token_expire_days: parse_or(&lookup, "REFRESH_TOKEN_EXPIRE_DAYS", 7)?,
            },
            rate_limit,
        })
    }

    /// Builds the configuration from key/value pairs, for tests
    pub fn from_pairs(pairs: &[(&str, &str)]) -> anyhow::Result<Self> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::from_lookup(|key| map.get(key).cloned())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            ..Default::default()
        }
    }

    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            url: self.redis.url.clone(),
            connection_timeout_secs: self.redis.connection_timeout_secs,
            command_timeout_secs: self.redis.command_timeout_secs,
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit.requests,
            window: Duration::from_secs(self.rate_limit.window_secs),
        }
    }

    /// Token codec with the configured secret, algorithm and lifetimes
    pub fn token_codec(&self) -> anyhow::Result<TokenCodec> {
        let algorithm = TokenCodec::parse_algorithm(&self.jwt.algorithm)?;
        Ok(TokenCodec::with_lifetimes(
            &self.jwt.secret,
            algorithm,
            chrono::Duration::minutes(self.jwt.access_token_expire_minutes),
            chrono::Duration::days(self.jwt.refresh_token_expire_days),
        ))
    }
}
