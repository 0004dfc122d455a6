/// Signup, login and token lifecycle
///
/// [`AuthService`] ties the token codec, the password hasher, the revocation
/// store and a [`CredentialStore`] together:
///
/// - **signup**: rejects an email held by a live user, hashes the password
///   and stores the user
/// - **login**: verifies the password and issues an access/refresh pair
/// - **authenticate**: verifies a token, checks its kind and the blocklist
/// - **resolve_user**: re-reads the live user named by the claims, so role
///   changes and deletions take effect before the token expires
/// - **refresh**: mints a new access token from refresh-token claims
/// - **logout**: blocklists the token's jti for its remaining lifetime
///
/// Roles are never embedded in tokens.

use super::authorization::require_role;
use super::jwt::{Claims, IdentityClaims, JwtError, TokenCodec, TokenKind};
use super::password::{hash_password_blocking, verify_password_blocking, PasswordError};
use super::revocation::{revocation_ttl, RevocationError, RevocationStore};
use crate::models::user::{NewUser, Role, User, UserCredentials};
use crate::models::RepositoryError;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgConnection;
use std::sync::Arc;

/// Failures surfaced by the auth pipeline
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing credential, or a refresh token where an access token belongs
    #[error("Access token required")]
    AccessTokenRequired,

    /// An access token where a refresh token belongs
    #[error("Refresh token required")]
    RefreshTokenRequired,

    /// Bad signature, expired, revoked, or the user is gone
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Role gate rejected the caller
    #[error("Insufficient permission")]
    InsufficientPermission,

    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("Invalid Email or Password")]
    InvalidCredentials,

    /// Signup with an email held by a live user
    #[error("User with email already exists")]
    UserAlreadyExists,

    #[error(transparent)]
    Revocation(#[from] RevocationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Jwt(#[from] JwtError),
}

/// User lookups and inserts needed by the pipeline
///
/// Implemented for [`PgConnection`] so the pipeline runs inside the
/// request's transaction.
#[async_trait]
pub trait CredentialStore: Send {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_credentials_by_email(
        &mut self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    async fn insert(&mut self, user: NewUser) -> Result<User, RepositoryError>;
}

#[async_trait]
impl CredentialStore for PgConnection {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, RepositoryError> {
        User::find_by_email(self, email).await
    }

    async fn find_credentials_by_email(
        &mut self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        User::find_credentials_by_email(self, email).await
    }

    async fn insert(&mut self, user: NewUser) -> Result<User, RepositoryError> {
        User::create(self, user).await
    }
}

/// Signup input, already validated by the transport layer
#[derive(Debug, Clone)]
pub struct Signup {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

/// Successful login result
#[derive(Debug, Clone, Serialize)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub email: String,
    pub id: i64,
    pub role: Role,
}

/// Auth pipeline shared by every request
#[derive(Clone)]
pub struct AuthService {
    codec: TokenCodec,
    revocation: Arc<dyn RevocationStore>,
}

impl AuthService {
    pub fn new(codec: TokenCodec, revocation: Arc<dyn RevocationStore>) -> Self {
        Self { codec, revocation }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Creates a USER account
    ///
    /// # Errors
    ///
    /// - [`AuthError::UserAlreadyExists`] when a live user holds the email
    /// - [`AuthError::Repository`] with [`RepositoryError::Duplicate`] when a
    ///   concurrent signup won the race to the unique index
    pub async fn signup<S>(&self, store: &mut S, input: Signup) -> Result<User, AuthError>
    where
        S: CredentialStore + ?Sized,
    {
        if store.find_by_email(&input.email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password_blocking(input.password).await?;

        let user = store
            .insert(NewUser {
                name: input.name,
                email: input.email,
                role: Role::User,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = user.id, "User signed up");

        Ok(user)
    }

    /// Verifies credentials and issues an access/refresh pair
    pub async fn login<S>(&self, store: &mut S, email: &str, password: &str) -> Result<LoginTokens, AuthError>
    where
        S: CredentialStore + ?Sized,
    {
        let credentials = store
            .find_credentials_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let matches =
            verify_password_blocking(password.to_string(), credentials.password_hash.clone()).await?;
        if !matches {
            tracing::debug!(user_id = credentials.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let identity = IdentityClaims {
            email: credentials.email.clone(),
            user_id: credentials.id,
        };

        Ok(LoginTokens {
            access_token: self.codec.issue_access(&identity)?,
            refresh_token: self.codec.issue_refresh(&identity)?,
            email: credentials.email,
            id: credentials.id,
            role: credentials.role,
        })
    }

    /// Verifies `token`, requires it to be of `kind` and not revoked
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] for a bad signature, expiry or a
    ///   blocklisted jti
    /// - [`AuthError::AccessTokenRequired`] / [`AuthError::RefreshTokenRequired`]
    ///   when the token is of the other kind
    /// - [`AuthError::Revocation`] when the blocklist cannot be consulted
    pub async fn authenticate(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let claims = self.codec.verify(token).ok_or(AuthError::InvalidToken)?;

        if claims.kind() != kind {
            return Err(match kind {
                TokenKind::Access => AuthError::AccessTokenRequired,
                TokenKind::Refresh => AuthError::RefreshTokenRequired,
            });
        }

        if self.revocation.is_revoked(&claims.jti).await? {
            tracing::info!(jti = %claims.jti, "Rejected revoked token");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// Loads the live user the claims were issued to
    ///
    /// A deleted user, or a new user who reused a deleted user's email, no
    /// longer matches and the token is treated as invalid.
    pub async fn resolve_user<S>(&self, store: &mut S, claims: &Claims) -> Result<User, AuthError>
    where
        S: CredentialStore + ?Sized,
    {
        match store.find_by_email(&claims.user.email).await? {
            Some(user) if user.id == claims.user.user_id => Ok(user),
            _ => Err(AuthError::InvalidToken),
        }
    }

    /// Role gate for a resolved user
    pub fn authorize(&self, user: &User, allowed: &[Role]) -> Result<(), AuthError> {
        require_role(user.role, allowed).map_err(|_| AuthError::InsufficientPermission)
    }

    /// Issues a fresh access token for the holder of refresh `claims`
    pub fn refresh(&self, claims: &Claims) -> Result<String, AuthError> {
        if !claims.refresh {
            return Err(AuthError::RefreshTokenRequired);
        }
        if claims.is_expired() {
            return Err(AuthError::InvalidToken);
        }

        Ok(self.codec.issue_access(&claims.user)?)
    }

    /// Blocklists the jti of `claims` until the token would have expired
    pub async fn logout(&self, claims: &Claims) -> Result<(), AuthError> {
        let ttl = revocation_ttl(claims.time_until_expiration());
        self.revocation.revoke(&claims.jti, ttl).await?;

        tracing::info!(user_id = claims.user.user_id, jti = %claims.jti, ttl, "Token revoked");

        Ok(())
    }
}
