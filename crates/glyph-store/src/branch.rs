//! Branch resolver — reconstructs the active linear context of a session.
//!
//! A session's message log is a tree flattened into turn indices: a retry
//! appends a sibling at the same turn index instead of mutating history.
//! The active branch is recomputed on every request by a full session
//! scan — the latest (greatest-id) message at each turn index wins. There
//! is deliberately no mutable HEAD pointer to corrupt.

use rusqlite::Connection;

use glyph_core::Message;

use crate::errors::Result;
use crate::repositories::message::MessageRepo;

/// Resolve the ordered prior context for a new request.
///
/// * `anchor_id` — the message the request is relative to. `None` means
///   first turn (empty context). An unknown anchor also yields empty
///   context rather than an error.
/// * `is_retry` — when set, the anchor's own turn and everything after it
///   are discarded: a new sibling will replace it.
///
/// Returns the latest-at-turn messages for turn 0 up to the computed
/// maximum, in ascending turn order. Turns missing from the log (from
/// prior failed saves) are skipped.
pub fn resolve_branch(
    conn: &Connection,
    session_id: &str,
    anchor_id: Option<i64>,
    is_retry: bool,
) -> Result<Vec<Message>> {
    let messages = MessageRepo::list_by_session(conn, session_id)?;

    // Latest (greatest id) message per turn index. list_by_session returns
    // ascending id order, so a plain overwrite keeps the winner.
    let mut latest_at_turn: std::collections::HashMap<i64, Message> =
        std::collections::HashMap::with_capacity(messages.len());
    let mut anchor_turn: Option<i64> = None;
    for msg in messages {
        if anchor_id == Some(msg.id) {
            anchor_turn = Some(msg.turn_index);
        }
        let _ = latest_at_turn.insert(msg.turn_index, msg);
    }

    let max_turn = match anchor_turn {
        Some(turn) if is_retry => turn - 1,
        Some(turn) => turn,
        None => -1,
    };

    let mut branch = Vec::new();
    for turn in 0..=max_turn {
        if let Some(msg) = latest_at_turn.remove(&turn) {
            branch.push(msg);
        }
    }
    Ok(branch)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
