/// Authentication and authorization
///
/// # Modules
///
/// - [`jwt`]: token issuance and verification
/// - [`password`]: Argon2id password hashing and verification
/// - [`revocation`]: blocklist of revoked token ids (Redis or in-memory)
/// - [`authorization`]: role gate and task ownership checks
/// - [`pipeline`]: signup, login, refresh and logout on top of the above
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use jsonwebtoken::Algorithm;
/// use taskmm_shared::auth::jwt::{TokenCodec, TokenKind};
/// use taskmm_shared::auth::pipeline::AuthService;
/// use taskmm_shared::auth::revocation::InMemoryRevocationStore;
///
/// # async fn example(conn: &mut sqlx::PgConnection) -> Result<(), Box<dyn std::error::Error>> {
/// let auth = AuthService::new(
///     TokenCodec::new("your-secret-key-at-least-32-bytes", Algorithm::HS256),
///     Arc::new(InMemoryRevocationStore::new()),
/// );
///
/// let tokens = auth.login(conn, "admin@gmail.com", "password").await?;
/// let claims = auth.authenticate(&tokens.access_token, TokenKind::Access).await?;
/// let user = auth.resolve_user(conn, &claims).await?;
/// println!("{} is {}", user.email, user.role);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod password;
pub mod pipeline;
pub mod revocation;
