//! Liveness probe for the gateway and its queue.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when storage is unreachable.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Tasks waiting behind the running one.
    pub queue_size: usize,
    /// Job currently holding the backend, if any.
    pub running_job: Option<String>,
}

/// GET /health
///
/// Always answers 200 so a load balancer can tell "up but degraded" apart
/// from "down". The queue figures are read without touching Forge.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match navigator_db::health_check(&state.pool).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health probe could not reach the database");
            false
        }
    };

    let running_job = state.scheduler.current().await.map(|active| active.job_id);

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        queue_size: state.scheduler.queue_size().await,
        running_job,
    })
}

/// Mounted at the root, outside `/api`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
