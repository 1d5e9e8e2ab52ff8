//! # glyph-store
//!
//! The turn store: an append-only, branching message log over `SQLite`.
//!
//! - [`connection`] — r2d2 pool with WAL + foreign keys
//! - [`migrations`] — embedded, versioned schema migrations
//! - [`repositories`] — stateless SQL repos for sessions and messages
//! - [`branch`] — the active-branch resolver (latest id at each turn wins)
//! - [`TurnStore`] — facade over the pool composing the above

pub mod branch;
pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;

use glyph_core::{Message, NewMessage, Session, SessionId};

use crate::connection::{ConnectionConfig, ConnectionPool, PooledConnection};
use crate::errors::{Result, StoreError};
use crate::repositories::message::MessageRepo;
use crate::repositories::session::SessionRepo;

pub use errors::StoreError as Error;

/// High-level turn store wrapping a connection pool.
///
/// All methods are synchronous; callers on the async pipeline invoke them
/// directly (writes are small) or via `spawn_blocking` for the shielded
/// abort save.
pub struct TurnStore {
    pool: ConnectionPool,
}

impl TurnStore {
    /// Open an in-memory store (tests, ephemeral runs).
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        let store = Self { pool };
        let conn = store.conn()?;
        let _ = migrations::run_migrations(&conn)?;
        Ok(store)
    }

    /// Open (and migrate) a file-backed store.
    pub fn open_file(path: &str) -> Result<Self> {
        let pool = connection::new_file(path, &ConnectionConfig::default())?;
        let store = Self { pool };
        let conn = store.conn()?;
        let _ = migrations::run_migrations(&conn)?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new session.
    pub fn create_session(&self, title: &str, owner: Option<&str>) -> Result<Session> {
        let conn = self.conn()?;
        SessionRepo::create(&conn, title, owner)
    }

    /// Get a session by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;
        SessionRepo::get_by_id(&conn, session_id)
    }

    /// Get a session by ID, or fail with [`StoreError::SessionNotFound`].
    pub fn require_session(&self, session_id: &str) -> Result<Session> {
        self.get_session(session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_owned()))
    }

    /// List sessions, most recently active first.
    pub fn list_sessions(&self, limit: Option<i64>) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        SessionRepo::list(&conn, limit)
    }

    /// Update a session's title. Returns false if the session is unknown.
    pub fn update_session_title(&self, session_id: &str, title: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::update_title(&conn, session_id, title)
    }

    /// Delete a session and (via cascade) all its messages.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::delete(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────

    /// Append a message to a session's log.
    pub fn append_message(&self, session_id: &SessionId, new: &NewMessage) -> Result<Message> {
        let conn = self.conn()?;
        MessageRepo::insert(&conn, session_id, new)
    }

    /// Get a message by rowid.
    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        let conn = self.conn()?;
        MessageRepo::get_by_id(&conn, id)
    }

    /// List all messages in a session, in insertion order.
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        MessageRepo::list_by_session(&conn, session_id)
    }

    /// Rowid of the most recent message in a session, if any.
    pub fn latest_message_id(&self, session_id: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        MessageRepo::latest_id(&conn, session_id)
    }

    /// Resolve the active prior context for a request. See [`branch::resolve_branch`].
    pub fn resolve_branch(
        &self,
        session_id: &str,
        anchor_id: Option<i64>,
        is_retry: bool,
    ) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        branch::resolve_branch(&conn, session_id, anchor_id, is_retry)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_core::Role;

    #[test]
    fn facade_end_to_end() {
        let store = TurnStore::open_in_memory().unwrap();
        let session = store.create_session("draw a sales chart", None).unwrap();

        let user = store
            .append_message(
                &session.id,
                &NewMessage {
                    role: Role::User,
                    content: "draw a sales chart".into(),
                    turn_index: 0,
                    ..Default::default()
                },
            )
            .unwrap();
        let assistant = store
            .append_message(
                &session.id,
                &NewMessage {
                    parent_id: Some(user.id),
                    role: Role::Assistant,
                    content: String::new(),
                    agent: Some("charts".into()),
                    turn_index: 1,
                    ..Default::default()
                },
            )
            .unwrap();

        let branch = store
            .resolve_branch(session.id.as_str(), Some(assistant.id), false)
            .unwrap();
        assert_eq!(branch.len(), 2);
        assert_eq!(
            store.latest_message_id(session.id.as_str()).unwrap(),
            Some(assistant.id)
        );

        assert!(store.delete_session(session.id.as_str()).unwrap());
        assert!(store.list_messages(session.id.as_str()).unwrap().is_empty());
    }

    #[test]
    fn facade_session_maintenance() {
        let store = TurnStore::open_in_memory().unwrap();
        let session = store.create_session("untitled", None).unwrap();

        assert!(
            store
                .update_session_title(session.id.as_str(), "renamed")
                .unwrap()
        );
        let sessions = store.list_sessions(None).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "renamed");

        let user = store
            .append_message(
                &session.id,
                &NewMessage {
                    role: Role::User,
                    content: "hello".into(),
                    turn_index: 0,
                    ..Default::default()
                },
            )
            .unwrap();
        let fetched = store.get_message(user.id).unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
        assert!(store.get_message(user.id + 1).unwrap().is_none());
    }

    #[test]
    fn require_session_errors_on_unknown() {
        let store = TurnStore::open_in_memory().unwrap();
        let err = store.require_session("missing").unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glyph.db");
        let path = path.to_str().unwrap();

        let id = {
            let store = TurnStore::open_file(path).unwrap();
            store.create_session("persisted", None).unwrap().id
        };
        let store = TurnStore::open_file(path).unwrap();
        let session = store.get_session(id.as_str()).unwrap().unwrap();
        assert_eq!(session.title, "persisted");
    }
}
