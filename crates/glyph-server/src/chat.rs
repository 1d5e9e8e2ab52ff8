//! `POST /chat/stream` — one chat turn as a Server-Sent Events stream.
//!
//! The pipeline runs on its own spawned task and keeps running even if
//! the response future is dropped; client disconnect is signalled to it
//! through a `CancellationToken` held by a `DropGuard` inside the SSE
//! stream, so the interrupted turn still gets saved.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use glyph_core::SessionId;
use glyph_runtime::{TurnRequest, run_turn};

use crate::server::AppState;

/// Body of `POST /chat/stream`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Existing session to continue; omit to start a new one.
    pub session_id: Option<SessionId>,
    /// The user's prompt.
    pub prompt: String,
    /// Image attachments (data URLs).
    #[serde(default)]
    pub images: Vec<String>,
    /// Anchor message id; omit to anchor at the latest message.
    pub parent_id: Option<i64>,
    /// Retry the anchor's turn instead of continuing past it.
    #[serde(default)]
    pub is_retry: bool,
}

/// POST /chat/stream
pub async fn chat_stream(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel(state.config.event_buffer);
    let cancel = CancellationToken::new();

    let req = TurnRequest {
        session_id: body.session_id,
        prompt: body.prompt,
        images: body.images,
        parent_id: body.parent_id,
        retry: body.is_retry,
    };
    // Detached on purpose: the turn must outlive a dropped response.
    drop(tokio::spawn(run_turn(
        state.store.clone(),
        state.provider.clone(),
        req,
        tx,
        cancel.clone(),
    )));

    let keep_alive_secs = state.config.keep_alive_secs;
    let stream = async_stream::stream! {
        // Cancels the pipeline when the client goes away.
        let _guard = cancel.drop_guard();
        while let Some(ev) = rx.recv().await {
            yield Ok(Event::default().event(ev.name()).data(ev.payload().to_string()));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(keep_alive_secs))
            .text("ping"),
    )
}
