/// JWT token issuance and verification
///
/// Access and refresh tokens share a single claim layout and a single signing
/// primitive. They differ only in their lifetime and the `refresh` flag.
///
/// # Claims
///
/// ```json
/// {
///   "user": { "email": "admin@gmail.com", "user_id": 1 },
///   "exp": 1735689600,
///   "jti": "6f1c2e7a-...",
///   "refresh": false
/// }
/// ```
///
/// The user's role is never embedded. It is resolved from storage on every
/// authenticated request.
///
/// # Example
///
/// ```
/// use taskmm_shared::auth::jwt::{IdentityClaims, TokenCodec, TokenKind};
/// use jsonwebtoken::Algorithm;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let codec = TokenCodec::new("your-secret-key-at-least-32-bytes", Algorithm::HS256);
/// let identity = IdentityClaims { email: "a@b.com".to_string(), user_id: 7 };
///
/// let token = codec.issue_access(&identity)?;
/// let claims = codec.verify(&token).expect("token should verify");
/// assert_eq!(claims.user, identity);
/// assert_eq!(claims.kind(), TokenKind::Access);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Default lifetime of an access token
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 60;

/// Default lifetime of a refresh token
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Algorithm is not an HMAC algorithm
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Which of the two token flavours a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived token accepted by protected endpoints
    Access,

    /// Long-lived token accepted only by the refresh endpoint
    Refresh,
}

impl TokenKind {
    pub fn is_refresh(&self) -> bool {
        matches!(self, TokenKind::Refresh)
    }
}

/// Identity embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    pub user_id: i64,
}

/// Full claim set of an issued token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity of the token holder
    pub user: IdentityClaims,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Unique token id, the revocation key
    pub jti: String,

    /// Distinguishes refresh tokens from access tokens
    pub refresh: bool,
}

impl Claims {
    /// Creates claims expiring `ttl` from now with a fresh jti
    pub fn new(user: IdentityClaims, ttl: Duration, refresh: bool) -> Self {
        Self {
            user,
            exp: (Utc::now() + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            refresh,
        }
    }

    pub fn kind(&self) -> TokenKind {
        if self.refresh {
            TokenKind::Refresh
        } else {
            TokenKind::Access
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Signs and verifies tokens with a process-wide secret and algorithm
///
/// Keys are derived once at construction. Cloning is cheap.
#[derive(Clone)]
pub struct TokenCodec {
    inner: Arc<CodecInner>,
}

struct CodecInner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Creates a codec with the default access and refresh lifetimes
    pub fn new(secret: &str, algorithm: Algorithm) -> Self {
        Self::with_lifetimes(
            secret,
            algorithm,
            Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            Duration::days(REFRESH_TOKEN_TTL_DAYS),
        )
    }

    /// Creates a codec with custom lifetimes
    pub fn with_lifetimes(
        secret: &str,
        algorithm: Algorithm,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CodecInner {
                encoding_key: EncodingKey::from_secret(secret.as_bytes()),
                decoding_key: DecodingKey::from_secret(secret.as_bytes()),
                algorithm,
                access_ttl,
                refresh_ttl,
            }),
        }
    }

    /// Parses an HMAC algorithm name such as `HS256`
    ///
    /// # Errors
    ///
    /// Returns `JwtError::UnsupportedAlgorithm` for unknown names and for
    /// asymmetric algorithms, which cannot be used with a shared secret.
    pub fn parse_algorithm(name: &str) -> Result<Algorithm, JwtError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(JwtError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.inner.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.inner.refresh_ttl
    }

    /// Signs a token embedding `user`, expiring after `ttl`
    ///
    /// Every call generates a new jti, so two tokens issued for the same user
    /// in the same second are still distinct.
    pub fn issue(
        &self,
        user: &IdentityClaims,
        ttl: Duration,
        refresh: bool,
    ) -> Result<String, JwtError> {
        let claims = Claims::new(user.clone(), ttl, refresh);
        self.sign(&claims)
    }

    pub fn issue_access(&self, user: &IdentityClaims) -> Result<String, JwtError> {
        self.issue(user, self.inner.access_ttl, false)
    }

    pub fn issue_refresh(&self, user: &IdentityClaims) -> Result<String, JwtError> {
        self.issue(user, self.inner.refresh_ttl, true)
    }

    /// Signs an already assembled claim set
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        let header = Header::new(self.inner.algorithm);

        encode(&header, claims, &self.inner.encoding_key)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Verifies signature, structure and expiry
    ///
    /// Fails closed: any decoding or cryptographic failure yields `None`
    /// and the cause is only logged.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(self.inner.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<Claims>(token, &self.inner.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Token verification failed");
                None
            }
        }
    }
}
