//! Current-session endpoints.
//!
//! The session is identified by the request's cookie; every response that
//! touches the store carries the resulting `Set-Cookie` headers.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use cellar_session::{Session, SessionValues};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::state::AppState;

/// Session as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Session ID, absent until the session is first saved.
    pub id: Option<String>,
    /// Whether the session was created by this request.
    pub is_new: bool,
    /// Session values.
    pub values: SessionValues,
    /// When the session expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id().map(str::to_string),
            is_new: session.is_new(),
            values: session.values().clone(),
            expires_at: session.expires_at(),
        }
    }
}

/// GET /api/v1/session - Load the current session and refresh its expiry.
pub async fn get_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<SessionResponse>)> {
    let mut session = state.store().get(&headers)?;
    let was_new = session.is_new();

    let mut response_headers = HeaderMap::new();
    state.store().save(&mut response_headers, &mut session)?;

    Ok((
        response_headers,
        Json(SessionResponse {
            is_new: was_new,
            ..SessionResponse::from(&session)
        }),
    ))
}

/// PUT /api/v1/session - Merge values into the current session.
///
/// Each key in the body is set on the session; a `null` value removes the key.
pub async fn update_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(updates): Json<Map<String, Value>>,
) -> Result<(HeaderMap, Json<SessionResponse>)> {
    let mut session = state.store().get(&headers)?;
    let was_new = session.is_new();

    for (key, value) in updates {
        if value.is_null() {
            session.remove(&key);
        } else {
            session.insert_value(key, value);
        }
    }

    let mut response_headers = HeaderMap::new();
    state.store().save(&mut response_headers, &mut session)?;
    debug!(created = was_new, keys = session.values().len(), "Session updated");

    Ok((
        response_headers,
        Json(SessionResponse {
            is_new: was_new,
            ..SessionResponse::from(&session)
        }),
    ))
}

/// DELETE /api/v1/session - End the current session and clear its cookie.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap)> {
    let mut session = state.store().get(&headers)?;

    let mut response_headers = HeaderMap::new();
    state.store().delete(&mut response_headers, &mut session)?;

    Ok((StatusCode::NO_CONTENT, response_headers))
}
