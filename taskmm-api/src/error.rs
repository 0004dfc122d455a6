/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`. An `ApiError` renders as the
/// failure envelope:
///
/// ```json
/// { "success": false, "message": "Validation Failed",
///   "error_details": { "validationErrors": [{ "field": "email", "error": "email already exists" }] } }
/// ```
///
/// Domain errors convert through `From`, so `?` is enough in handlers.
/// Internal failures are logged with their full cause and answered with a
/// generic message.
///
/// # Example
///
/// ```
/// use taskmm_api::error::{ApiError, ApiResult};
///
/// fn lookup(found: bool) -> ApiResult<&'static str> {
///     if !found {
///         return Err(ApiError::NotFound("No task data found!".to_string()));
///     }
///     Ok("task")
/// }
/// ```

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskmm_shared::auth::authorization::AuthzError;
use taskmm_shared::auth::jwt::JwtError;
use taskmm_shared::auth::password::PasswordError;
use taskmm_shared::auth::pipeline::AuthError;
use taskmm_shared::auth::revocation::RevocationError;
use taskmm_shared::models::RepositoryError;
use taskmm_shared::pagination::PaginationError;
use taskmm_shared::redis::rate_limit::RateLimitError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Message returned for every unclassified failure
pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Unprocessable entity (422)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500); the message is logged, never returned
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// One field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub error: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            error: error.into(),
        }
    }
}

/// Failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_details: Option<serde_json::Value>,
}

impl ApiError {
    /// A 422 for a single field
    pub fn validation(field: impl Into<String>, error: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, error)])
    }

    /// Wraps any error as an internal failure
    pub fn internal(err: impl fmt::Display) -> Self {
        ApiError::InternalError(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut retry_after = None;

        let (message, error_details) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, None),
            ApiError::ValidationError(errors) => (
                "Validation Failed".to_string(),
                Some(serde_json::json!({ "validationErrors": errors })),
            ),
            ApiError::RateLimitExceeded { retry_after: secs, message } => {
                retry_after = Some(secs);
                (message, None)
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (INTERNAL_ERROR_MESSAGE.to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error_details,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Field errors from `#[derive(Validate)]`, sorted by field name
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| {
                    let error = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid ({})", field, e.code));
                    ValidationErrorDetail::new(field.clone(), error)
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation("query", rejection.body_text())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("No data found!".to_string()),
            other => RepositoryError::from(other).into(),
        }
    }
}

/// Constraint violations become field-level validation errors
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate { field } => {
                let error = format!("{} already exists", field);
                ApiError::validation(field, error)
            }
            RepositoryError::MissingReference { field } => {
                let error = format!("{} not found", field);
                ApiError::validation(field, error)
            }
            RepositoryError::Database(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        match err {
            PaginationError::InvalidCursor(reason) => {
                tracing::debug!(reason = %reason, "Rejected cursor");
                ApiError::BadRequest("Invalid cursor".to_string())
            }
            PaginationError::SortMismatch { .. } => {
                ApiError::BadRequest("Cursor does not match sort".to_string())
            }
            PaginationError::Database(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AccessTokenRequired
            | AuthError::RefreshTokenRequired
            | AuthError::InvalidToken
            | AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::UserAlreadyExists => ApiError::BadRequest(err.to_string()),
            AuthError::InsufficientPermission => ApiError::Forbidden(err.to_string()),
            AuthError::Revocation(e) => e.into(),
            AuthError::Repository(e) => e.into(),
            AuthError::Password(e) => e.into(),
            AuthError::Jwt(e) => e.into(),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Insufficient permission".to_string())
            }
            AuthzError::NotAssignee(_) => {
                ApiError::Forbidden("You are not authorized to update this task!".to_string())
            }
        }
    }
}

/// The blocklist cannot be consulted, so no token can be trusted
impl From<RevocationError> for ApiError {
    fn from(err: RevocationError) -> Self {
        tracing::error!(error = %err, "Revocation store unavailable");
        ApiError::ServiceUnavailable("Service temporarily unavailable".to_string())
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        tracing::error!(error = %err, "Rate limit store unavailable");
        ApiError::ServiceUnavailable("Service temporarily unavailable".to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::InternalError(format!("Token operation failed: {}", err))
    }
}
