/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /auth/signup` - Create a USER account
/// - `POST /auth/login` - Exchange credentials for an access/refresh pair
/// - `GET /auth/profile` - Current user (access token)
/// - `GET /auth/logout` - Revoke the presented access token
/// - `GET /auth/refresh_token` - New access token (refresh token)

use crate::{
    app::AppState,
    error::ApiResult,
    extract::ValidatedJson,
    middleware::auth::CurrentUser,
    response::ApiResponse,
    session::DbSession,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};
use taskmm_shared::auth::pipeline::{LoginTokens, Signup};
use taskmm_shared::models::user::User;
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(max = 25, message = "Name must be at most 25 characters"))]
    pub name: Option<String>,

    #[validate(
        email(message = "Invalid email format"),
        length(max = 40, message = "Email must be at most 40 characters")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Creates a USER account
///
/// ```text
/// POST /api/v1/auth/signup
///
/// { "name": "Jane", "email": "jane@example.com", "password": "secret1" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: a live user already holds the email
/// - `422 Unprocessable Entity`: validation failed
pub async fn signup(
    State(state): State<AppState>,
    session: DbSession,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> ApiResult<ApiResponse<User>> {
    let mut conn = session.connection().await?;

    let user = state
        .auth
        .signup(
            &mut *conn,
            Signup {
                name: req.name,
                email: req.email,
                password: req.password,
            },
        )
        .await?;

    Ok(ApiResponse::created(user))
}

/// Verifies credentials and issues tokens
///
/// # Response
///
/// ```json
/// {
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "email": "jane@example.com",
///   "id": 3,
///   "role": "USER"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    session: DbSession,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<ApiResponse<LoginTokens>> {
    let mut conn = session.connection().await?;
    let tokens = state.auth.login(&mut *conn, &req.email, &req.password).await?;

    Ok(ApiResponse::ok(tokens))
}

pub async fn profile(current: CurrentUser) -> ApiResult<ApiResponse<User>> {
    Ok(ApiResponse::ok(current.user))
}

/// Revokes the presented access token until it would have expired
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    state.auth.logout(&current.claims).await?;

    Ok(ApiResponse::message("Logged Out Successfully"))
}

/// Issues a new access token for the holder of a refresh token
pub async fn refresh_token(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<ApiResponse<RefreshResponse>> {
    let access_token = state.auth.refresh(&current.claims)?;

    Ok(ApiResponse::ok(RefreshResponse { access_token }))
}
