//! Session listing, history, rename, and delete routes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use glyph_core::{Message, Session};

use crate::errors::ApiError;
use crate::server::AppState;

/// Query parameters for `GET /sessions`.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Cap the number of sessions returned.
    pub limit: Option<i64>,
}

/// GET /sessions — most recently active first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Session>>, ApiError> {
    Ok(Json(state.store.list_sessions(params.limit)?))
}

/// GET /sessions/{id}/messages — the full log, in insertion order.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let _ = state.store.require_session(&id)?;
    Ok(Json(state.store.list_messages(&id)?))
}

/// Body of `PATCH /sessions/{id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateSession {
    /// New display title.
    pub title: String,
}

/// PATCH /sessions/{id}
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateSession>,
) -> Result<StatusCode, ApiError> {
    if state.store.update_session_title(&id, &body.title)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {id}")))
    }
}

/// DELETE /sessions/{id} — cascades to the session's messages.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_session(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session {id}")))
    }
}
