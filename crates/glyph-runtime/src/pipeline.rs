//! One chat turn, end to end: resolve the branch, persist the user
//! message, classify, stream the agent, multiplex wire events, persist
//! the assistant message.
//!
//! The pipeline communicates with the transport through an mpsc channel
//! of [`WireEvent`]s; the transport owns serialization. Cancellation
//! (client disconnect) is observed through a [`CancellationToken`] and a
//! closed channel — on either, the partial turn is saved through a
//! detached blocking task that outlives the request.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use glyph_core::{Message, NewMessage, Role, SessionId, WireEvent};
use glyph_store::TurnStore;

use crate::context;
use crate::errors::RuntimeError;
use crate::mux::TurnMux;
use crate::parser::TagParser;
use crate::provider::{AgentLabel, AgentProvider, AgentSignal};

/// Marker appended to the persisted content of an interrupted turn.
const TRUNCATION_MARKER: &str = "[response interrupted]";

/// Max chars of the first prompt used as a session title.
const TITLE_MAX_CHARS: usize = 80;

/// Everything needed to run one turn.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    /// Existing session to continue, or `None` to create one.
    pub session_id: Option<SessionId>,
    /// The user's prompt.
    pub prompt: String,
    /// Image attachments (data URLs).
    pub images: Vec<String>,
    /// Anchor message id. `None` anchors to the latest message.
    pub parent_id: Option<i64>,
    /// Retry the anchor's turn instead of continuing past it.
    pub retry: bool,
}

/// Run one turn, pushing wire events into `tx`.
///
/// Never returns an error to the caller: failures become a terminal
/// [`WireEvent::Error`] on the channel and a log line.
pub async fn run_turn(
    store: Arc<TurnStore>,
    provider: Arc<dyn AgentProvider>,
    req: TurnRequest,
    tx: mpsc::Sender<WireEvent>,
    cancel: CancellationToken,
) {
    match run_turn_inner(&store, provider.as_ref(), req, &tx, &cancel).await {
        Ok(()) => {}
        Err(RuntimeError::Cancelled) => {
            tracing::info!("turn cancelled by client");
        }
        Err(err) => {
            tracing::error!(category = err.category(), error = %err, "turn failed");
            let _ = tx
                .send(WireEvent::Error {
                    message: err.to_string(),
                })
                .await;
        }
    }
}

async fn run_turn_inner(
    store: &Arc<TurnStore>,
    provider: &dyn AgentProvider,
    req: TurnRequest,
    tx: &mpsc::Sender<WireEvent>,
    cancel: &CancellationToken,
) -> Result<(), RuntimeError> {
    // Session: continue an existing one or create on first contact.
    let session_id = match &req.session_id {
        Some(id) => {
            store
                .get_session(id)?
                .ok_or_else(|| RuntimeError::SessionNotFound(id.to_string()))?
                .id
        }
        None => {
            let session = store.create_session(&derive_title(&req.prompt), None)?;
            push(
                tx,
                WireEvent::SessionCreated {
                    session_id: session.id.clone(),
                },
            )
            .await?;
            session.id
        }
    };

    // Anchor defaults to the latest message so plain continuation needs
    // no client-side bookkeeping.
    let anchor_id = match req.parent_id {
        Some(id) => Some(id),
        None => store.latest_message_id(&session_id)?,
    };
    let branch = store.resolve_branch(&session_id, anchor_id, req.retry)?;
    let (parent_id, turn_index) = placement(store, anchor_id, req.retry)?;

    let user = store.append_message(
        &session_id,
        &NewMessage {
            parent_id,
            role: Role::User,
            content: req.prompt.clone(),
            attachments: req.images.clone(),
            turn_index,
            ..Default::default()
        },
    )?;
    push(
        tx,
        WireEvent::MessageCreated {
            id: user.id,
            role: Role::User,
            turn_index: user.turn_index,
            session_id: session_id.clone(),
        },
    )
    .await?;

    let messages = context::assemble(&branch, &req.prompt, &req.images);

    push(
        tx,
        WireEvent::Status {
            content: "Selecting an agent".to_owned(),
        },
    )
    .await?;
    let raw_label = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
        res = provider.classify(&messages) => res?,
    };
    let agent = AgentLabel::parse(&raw_label);
    tracing::debug!(session_id = %session_id, agent = %agent, "agent selected");

    let mut mux = TurnMux::new(session_id.clone(), agent);
    push(tx, mux.agent_selected()).await?;

    let mut stream = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
        res = provider.stream(agent, &messages) => res?,
    };

    // Structured agents stream tagged output through the parser; the
    // unconstrained class streams plain thought text.
    let mut parser = (agent != AgentLabel::General).then(TagParser::new);

    let outcome = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break Outcome::Aborted,
            next = stream.next() => match next {
                None => break Outcome::Finished,
                Some(Ok(AgentSignal::TextDelta(delta))) => {
                    if let Some(parser) = parser.as_mut() {
                        for parse_ev in parser.feed(&delta) {
                            for wire_ev in mux.on_parse(parse_ev) {
                                if push(tx, wire_ev).await.is_err() {
                                    break;
                                }
                            }
                        }
                    } else {
                        for wire_ev in mux.on_signal(AgentSignal::TextDelta(delta)) {
                            if push(tx, wire_ev).await.is_err() {
                                break;
                            }
                        }
                    }
                    if tx.is_closed() {
                        break Outcome::Aborted;
                    }
                }
                Some(Ok(sig)) => {
                    for wire_ev in mux.on_signal(sig) {
                        let _ = push(tx, wire_ev).await;
                    }
                    if tx.is_closed() {
                        break Outcome::Aborted;
                    }
                }
                Some(Err(err)) => break Outcome::Failed(err),
            }
        }
    };

    match outcome {
        Outcome::Finished => {
            // A truncated payload still gets balanced end events here.
            if let Some(parser) = parser.as_mut() {
                for parse_ev in parser.finalize() {
                    for wire_ev in mux.on_parse(parse_ev) {
                        let _ = push(tx, wire_ev).await;
                    }
                }
            }
            let agent_end = mux.finish();
            let _ = push(tx, agent_end).await;

            let assistant = store.append_message(
                &session_id,
                &NewMessage {
                    parent_id: Some(user.id),
                    role: Role::Assistant,
                    content: mux.persisted_content().to_owned(),
                    steps: mux.steps().to_vec(),
                    agent: Some(agent.as_str().to_owned()),
                    turn_index: user.turn_index + 1,
                    ..Default::default()
                },
            )?;
            let _ = push(
                tx,
                WireEvent::MessageCreated {
                    id: assistant.id,
                    role: Role::Assistant,
                    turn_index: assistant.turn_index,
                    session_id: session_id.clone(),
                },
            )
            .await;
            Ok(())
        }
        Outcome::Aborted => {
            fold_remainder(parser.as_mut(), &mut mux);
            spawn_abort_save(store, session_id, &user, mux);
            Err(RuntimeError::Cancelled)
        }
        Outcome::Failed(err) => {
            fold_remainder(parser.as_mut(), &mut mux);
            spawn_abort_save(store, session_id, &user, mux);
            Err(err.into())
        }
    }
}

enum Outcome {
    Finished,
    Aborted,
    Failed(crate::provider::ProviderError),
}

/// Fold whatever the parser still holds into the mux without emitting —
/// the client is gone, but the step trace must stay complete.
fn fold_remainder(parser: Option<&mut TagParser>, mux: &mut TurnMux) {
    if let Some(parser) = parser {
        for parse_ev in parser.finalize() {
            let _ = mux.on_parse(parse_ev);
        }
    }
    let _ = mux.finish();
}

/// Persist the interrupted assistant turn on a detached blocking task.
///
/// The task is deliberately not awaited: it must survive the request
/// future being dropped on client disconnect.
fn spawn_abort_save(store: &Arc<TurnStore>, session_id: SessionId, user: &Message, mux: TurnMux) {
    let store = Arc::clone(store);
    let new = NewMessage {
        parent_id: Some(user.id),
        role: Role::Assistant,
        content: truncated_content(&mux),
        agent: Some(mux.agent().as_str().to_owned()),
        turn_index: user.turn_index + 1,
        steps: mux.into_steps(),
        ..Default::default()
    };
    drop(tokio::task::spawn_blocking(move || {
        match store.append_message(&session_id, &new) {
            Ok(msg) => tracing::debug!(id = msg.id, "interrupted turn saved"),
            Err(err) => tracing::error!(error = %err, "failed to save interrupted turn"),
        }
    }));
}

fn truncated_content(mux: &TurnMux) -> String {
    let base = mux.persisted_content();
    if base.is_empty() {
        TRUNCATION_MARKER.to_owned()
    } else {
        format!("{base}\n\n{TRUNCATION_MARKER}")
    }
}

/// Where the new user message goes relative to the anchor.
///
/// A retry becomes a sibling of the anchor (same turn, same parent); a
/// continuation becomes its child. A missing or unknown anchor starts a
/// fresh root at turn 0.
fn placement(
    store: &TurnStore,
    anchor_id: Option<i64>,
    retry: bool,
) -> Result<(Option<i64>, i64), RuntimeError> {
    let Some(id) = anchor_id else {
        return Ok((None, 0));
    };
    let Some(anchor) = store.get_message(id)? else {
        return Ok((None, 0));
    };
    if retry {
        Ok((anchor.parent_id, anchor.turn_index))
    } else {
        Ok((Some(anchor.id), anchor.turn_index + 1))
    }
}

fn derive_title(prompt: &str) -> String {
    let title: String = prompt.trim().chars().take(TITLE_MAX_CHARS).collect();
    if title.is_empty() {
        "New conversation".to_owned()
    } else {
        title
    }
}

async fn push(tx: &mpsc::Sender<WireEvent>, ev: WireEvent) -> Result<(), RuntimeError> {
    tx.send(ev).await.map_err(|_| RuntimeError::Cancelled)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
