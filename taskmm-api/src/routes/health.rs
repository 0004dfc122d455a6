/// Health check endpoint
///
/// Provides a simple health check endpoint that verifies:
/// - The server is running
/// - Database connectivity
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "message": "Success",
///   "data": {
///     "status": "healthy",
///     "version": "0.1.0",
///     "database": "connected",
///     "pool": { "active_connections": 1, "idle_connections": 4, "total_connections": 5 }
///   },
///   "metadata": null
/// }
/// ```

use crate::{app::AppState, error::ApiResult, response::ApiResponse};
use axum::extract::State;
use serde::Serialize;
use taskmm_shared::db::pool::{get_pool_stats, health_check as ping_database, PoolStats};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    pub pool: PoolStats,
}

/// Health check handler
///
/// Always answers 200; a failing database only degrades the status.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<ApiResponse<HealthResponse>> {
    let database_status = match ping_database(&state.db).await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "disconnected"
        }
    };

    Ok(ApiResponse::ok(HealthResponse {
        status: if database_status == "connected" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: taskmm_shared::VERSION.to_string(),
        database: database_status.to_string(),
        pool: get_pool_stats(&state.db),
    }))
}
