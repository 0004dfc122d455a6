/// Route guards
///
/// Guards run as `route_layer`s, before the handler's extractors:
///
/// - [`access_token_guard`]: requires `Authorization: Bearer <access token>`,
///   rejects revoked tokens, loads the live user through the request's
///   [`DbSession`] and stores a [`CurrentUser`] in the request extensions
/// - [`refresh_token_guard`]: the same for refresh tokens
/// - [`role_guard`]: requires the [`CurrentUser`] to hold one of the allowed
///   roles; must be layered inside one of the token guards
///
/// Handlers take [`CurrentUser`] as an extractor.

use crate::error::ApiError;
use crate::session::DbSession;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use taskmm_shared::auth::authorization::require_role;
use taskmm_shared::auth::jwt::{Claims, TokenKind};
use taskmm_shared::auth::pipeline::{AuthError, AuthService};
use taskmm_shared::models::user::{Role, User};

/// Authenticated caller of the current request
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,

    /// Claims of the presented token; logout revokes their jti
    pub claims: Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AuthError::AccessTokenRequired.into())
    }
}

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn authenticate(
    auth: &AuthService,
    session: &DbSession,
    request: &mut Request,
    kind: TokenKind,
) -> Result<(), ApiError> {
    let missing = match kind {
        TokenKind::Access => AuthError::AccessTokenRequired,
        TokenKind::Refresh => AuthError::RefreshTokenRequired,
    };
    let token = bearer_token(request.headers()).ok_or(missing)?;

    let claims = auth.authenticate(token, kind).await?;

    let user = {
        let mut conn = session.connection().await?;
        auth.resolve_user(&mut *conn, &claims).await?
    };

    tracing::debug!(user_id = user.id, kind = ?kind, "Authenticated request");
    request.extensions_mut().insert(CurrentUser { user, claims });
    Ok(())
}

/// Requires a valid, unrevoked access token
pub async fn access_token_guard(
    State(auth): State<AuthService>,
    session: DbSession,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&auth, &session, &mut request, TokenKind::Access).await?;
    Ok(next.run(request).await)
}

/// Requires a valid, unrevoked refresh token
pub async fn refresh_token_guard(
    State(auth): State<AuthService>,
    session: DbSession,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticate(&auth, &session, &mut request, TokenKind::Refresh).await?;
    Ok(next.run(request).await)
}

/// Requires the authenticated user to hold one of `roles`
pub async fn role_guard(
    State(roles): State<&'static [Role]>,
    current: CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(e) = require_role(current.user.role, roles) {
        tracing::info!(user_id = current.user.id, role = %current.user.role, "Role gate rejected request");
        return Err(e.into());
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer  abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
