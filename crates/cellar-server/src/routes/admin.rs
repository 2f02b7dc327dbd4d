//! Administrative endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Outcome of a manual sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResponse {
    /// False when a sweep was already running and this one was skipped.
    pub ran: bool,
    pub scanned: usize,
    pub reclaimed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub callback_panics: usize,
}

/// DELETE /api/v1/admin/sessions/{id} - Revoke a session by ID.
pub async fn revoke_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.store().delete_by_id(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/sweep - Reclaim expired sessions now.
pub async fn sweep_handler(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let store = Arc::clone(&state.store);
    let report = tokio::task::spawn_blocking(move || store.sweep_now())
        .await
        .map_err(|e| ServerError::Internal(format!("sweep task failed: {}", e)))??;

    let response = match report {
        Some(r) => SweepResponse {
            ran: true,
            scanned: r.scanned,
            reclaimed: r.reclaimed,
            skipped: r.skipped,
            failed: r.failed,
            callback_panics: r.callback_panics,
        },
        None => SweepResponse::default(),
    };

    Ok(Json(response))
}
