//! # taskmm API Server
//!
//! REST backend for users and tasks with JWT authentication, token
//! revocation, role checks and per-client rate limiting.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment (and `.env`)
//! 2. Connect to PostgreSQL, apply migrations, optionally seed
//! 3. Connect to Redis for the token blocklist and the rate limiter
//! 4. Serve until SIGINT/SIGTERM, then drain and close the pool
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskmm-api
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use taskmm_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskmm_shared::auth::pipeline::AuthService;
use taskmm_shared::auth::revocation::RedisRevocationStore;
use taskmm_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
    seed::seed,
};
use taskmm_shared::redis::client::RedisClient;
use taskmm_shared::redis::rate_limit::RedisRateLimiter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskmm_api=debug,taskmm_shared=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("taskmm API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(&config.pool_config()).await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }
    if config.database.seed {
        let summary = seed(&pool).await?;
        tracing::info!(users = summary.users, tasks = summary.tasks, "Seed finished");
    }

    let redis = RedisClient::new(config.redis_config()).await?;
    let auth = AuthService::new(
        config.token_codec()?,
        Arc::new(RedisRevocationStore::new(redis.clone())),
    );
    let limiter = Arc::new(RedisRateLimiter::new(redis, config.rate_limit_config()));

    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config, auth, limiter);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
