//! Liveness and store health.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use cellar_session::ReclaimerState;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the session table cannot be read.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Background reclaimer state.
    pub reclaimer: String,
    /// Stored session rows, live or expired.
    pub sessions: Option<usize>,
}

/// GET /health - Report whether the store is reachable (no auth required).
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reclaimer = match state.store().reclaimer_state() {
        ReclaimerState::Idle => "idle",
        ReclaimerState::Sweeping => "sweeping",
        ReclaimerState::Stopped => "stopped",
    };

    let (status, sessions) = match state.store().session_count() {
        Ok(count) => (StatusCode::OK, Some(count)),
        Err(e) => {
            warn!(error = %e, "Health check could not read the session table");
            (StatusCode::SERVICE_UNAVAILABLE, None)
        }
    };

    let body = HealthResponse {
        status: if status.is_success() { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        reclaimer: reclaimer.to_string(),
        sessions,
    };
    (status, Json(body))
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
