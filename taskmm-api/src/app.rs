/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskmm_api::{app::AppState, config::Config};
/// use taskmm_shared::auth::pipeline::AuthService;
/// use taskmm_shared::auth::revocation::RedisRevocationStore;
/// use taskmm_shared::db::pool::create_pool;
/// use taskmm_shared::redis::client::RedisClient;
/// use taskmm_shared::redis::rate_limit::RedisRateLimiter;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(&config.pool_config()).await?;
/// let redis = RedisClient::new(config.redis_config()).await?;
///
/// let auth = AuthService::new(
///     config.token_codec()?,
///     Arc::new(RedisRevocationStore::new(redis.clone())),
/// );
/// let limiter = Arc::new(RedisRateLimiter::new(redis, config.rate_limit_config()));
///
/// let state = AppState::new(pool, config, auth, limiter);
/// let app = taskmm_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::{Config, CorsConfig},
    error::ApiError,
    middleware::{
        rate_limit::{rate_limit_middleware, RateLimitState},
        security::SecurityHeadersLayer,
        trusted_host::{trusted_host_middleware, TrustedHosts},
    },
    routes,
    session::db_session_middleware,
};
use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use sqlx::PgPool;
use std::any::Any;
use std::sync::Arc;
use taskmm_shared::auth::pipeline::AuthService;
use taskmm_shared::redis::rate_limit::RateLimiter;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor. Every
/// field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Token issuing, verification and revocation
    pub auth: AuthService,

    /// Per-client request counter
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, auth: AuthService, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            auth,
            rate_limiter,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                      # Health check (public)
/// └── {prefix}/                        # default /api/v1
///     ├── /auth/{signup,login,profile,logout,refresh_token}
///     ├── /users, /users/find/:id, /users/update/:id, /users/delete/:id
///     └── /tasks, /tasks/:id
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Logging (tower-http TraceLayer)
/// 2. Security headers
/// 3. CORS
/// 4. Trusted host check
/// 5. Rate limiting
/// 6. Per-request database session
/// 7. Panic catcher
/// 8. Per-route guards (see `routes::route_table`)
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let rate_limit = RateLimitState {
        limiter: state.rate_limiter.clone(),
        fail_open: config.rate_limit.fail_open,
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::api_router(&state, &config.api.prefix))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn_with_state(state.db.clone(), db_session_middleware))
        .layer(from_fn_with_state(rate_limit, rate_limit_middleware))
        .layer(from_fn_with_state(
            TrustedHosts::new(&config.api.trusted_hosts),
            trusted_host_middleware,
        ))
        .layer(cors_layer(&config.api.cors))
        .layer(SecurityHeadersLayer::new(config.api.production))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::InternalError(format!("Handler panicked: {}", detail)).into_response()
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

/// Permissive when any origin is allowed, otherwise an explicit allow list
fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    if is_wildcard(&cors.allowed_origins) {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let methods = if is_wildcard(&cors.allowed_methods) {
        AllowMethods::mirror_request()
    } else {
        AllowMethods::list(
            cors.allowed_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok()),
        )
    };

    let headers = if is_wildcard(&cors.allowed_headers) {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(
            cors.allowed_headers
                .iter()
                .filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(cors.allow_credentials)
        .max_age(std::time::Duration::from_secs(3600))
}
