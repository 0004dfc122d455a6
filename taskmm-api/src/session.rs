/// Per-request persistence session
///
/// Every request gets a [`DbSession`]. The first call to
/// [`DbSession::connection`] begins a transaction on the pool and every
/// later call reuses it, so guards and handlers of one request see the same
/// uncommitted state.
///
/// When the response is produced the middleware commits the transaction if
/// the status is below 400 and rolls it back otherwise. A request that never
/// touched the database never checks out a connection.

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

/// Lazily begun transaction shared by one request
#[derive(Clone)]
pub struct DbSession {
    pool: PgPool,
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
    finished: Arc<std::sync::atomic::AtomicBool>,
}

impl DbSession {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tx: Arc::new(Mutex::new(None)),
            finished: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Connection inside the request transaction, beginning it on first use
    ///
    /// The guard must be dropped before the next call on the same session.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, PgConnection>, ApiError> {
        if self.finished.load(std::sync::atomic::Ordering::Acquire) {
            return Err(ApiError::internal("database session already finished"));
        }

        let mut slot = self.tx.lock().await;
        if slot.is_none() {
            *slot = Some(self.pool.begin().await.map_err(|e| {
                ApiError::internal(format!("Failed to begin transaction: {}", e))
            })?);
        }

        MutexGuard::try_map(slot, |tx| tx.as_deref_mut())
            .map_err(|_| ApiError::internal("database session unavailable"))
    }

    /// Whether a transaction has been begun
    pub async fn is_active(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Commits or rolls back the transaction, if one was begun
    pub async fn finish(&self, commit: bool) -> Result<(), sqlx::Error> {
        self.finished.store(true, std::sync::atomic::Ordering::Release);

        let Some(tx) = self.tx.lock().await.take() else {
            return Ok(());
        };

        if commit {
            tx.commit().await
        } else {
            tx.rollback().await
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for DbSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<DbSession>()
            .cloned()
            .ok_or_else(|| ApiError::internal("database session middleware not installed"))
    }
}

/// Opens a session for the request and finishes it from the response status
pub async fn db_session_middleware(State(pool): State<PgPool>, mut req: Request, next: Next) -> Response {
    let session = DbSession::new(pool);
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;
    let commit = response.status().as_u16() < 400;

    match session.finish(commit).await {
        Ok(()) => response,
        Err(e) if commit => {
            ApiError::internal(format!("Failed to commit transaction: {}", e)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to roll back transaction");
            response
        }
    }
}
