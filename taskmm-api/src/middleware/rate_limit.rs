/// Per-client rate limiting middleware
///
/// Every request is counted against its client IP in a sliding window (see
/// `taskmm_shared::redis::rate_limit`). Requests over the limit are answered
/// with 429 and a `Retry-After` header without reaching the handlers.
///
/// # Client identification
///
/// The socket peer address when the server was started with connect info,
/// otherwise the first `X-Forwarded-For` entry, otherwise `unknown`.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per window
/// - `X-RateLimit-Remaining`: requests left in the current window
/// - `Retry-After`: seconds to wait (429 responses only)
///
/// # Store failures
///
/// When the store cannot be reached the request is refused with 503, unless
/// the limiter was built with `fail_open`, in which case it passes with a
/// warning.

use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use taskmm_shared::redis::rate_limit::RateLimiter;

/// State of the rate limit middleware
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<dyn RateLimiter>,
    pub fail_open: bool,
}

/// Key identifying the caller
pub fn client_ip(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    forwarded_for(request.headers()).unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Rate limiting middleware
///
/// # Errors
///
/// - 429 Too Many Requests: limit exceeded
/// - 503 Service Unavailable: store unreachable and not failing open
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_ip(&request);

    let decision = match state.limiter.check(&key).await {
        Ok(decision) => decision,
        Err(e) if state.fail_open => {
            tracing::warn!(error = %e, client = %key, "Rate limiter unavailable, letting request through");
            return next.run(request).await;
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    if !decision.allowed {
        tracing::warn!(
            client = %key,
            count = decision.count,
            limit = decision.limit,
            "Rate limit exceeded"
        );

        let mut response = ApiError::RateLimitExceeded {
            retry_after: decision.retry_after_secs,
            message: "Too Many Requests".to_string(),
        }
        .into_response();
        insert_limit_headers(&mut response, decision.limit, 0);
        return response;
    }

    let mut response = next.run(request).await;
    insert_limit_headers(
        &mut response,
        decision.limit,
        decision.limit.saturating_sub(decision.count),
    );
    response
}

fn insert_limit_headers(response: &mut Response, limit: u64, remaining: u64) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
}
