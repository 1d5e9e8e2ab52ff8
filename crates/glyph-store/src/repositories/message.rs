//! Message repository — the append-only branching message log.
//!
//! Messages are never updated or deleted individually; retries append
//! siblings at the same turn index. The `attachments` and `steps` columns
//! are JSON arrays.

use rusqlite::{Connection, OptionalExtension, params};

use glyph_core::{Message, NewMessage, Role, SessionId, StepRecord};

use crate::errors::{Result, StoreError};

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Append a message to a session's log.
    ///
    /// Validates the weak parent reference: a parent must exist in the
    /// same session. Bumps the session's `updated_at`.
    pub fn insert(conn: &Connection, session_id: &SessionId, new: &NewMessage) -> Result<Message> {
        if let Some(parent_id) = new.parent_id {
            let parent_session: Option<String> = conn
                .query_row(
                    "SELECT session_id FROM messages WHERE id = ?1",
                    params![parent_id],
                    |row| row.get(0),
                )
                .optional()?;
            if parent_session.as_deref() != Some(session_id.as_str()) {
                return Err(StoreError::ForeignParent {
                    parent_id,
                    session_id: session_id.to_string(),
                });
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let attachments_json = serde_json::to_string(&new.attachments)?;
        let steps_json = serde_json::to_string(&new.steps)?;

        let _ = conn.execute(
            "INSERT INTO messages
             (session_id, parent_id, role, content, attachments, steps, agent, turn_index, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session_id.as_str(),
                new.parent_id,
                new.role.as_str(),
                new.content,
                attachments_json,
                steps_json,
                new.agent,
                new.turn_index,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();

        let _ = conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![now, session_id.as_str()],
        )?;

        Ok(Message {
            id,
            session_id: session_id.clone(),
            parent_id: new.parent_id,
            role: new.role,
            content: new.content.clone(),
            attachments: new.attachments.clone(),
            steps: new.steps.clone(),
            agent: new.agent.clone(),
            turn_index: new.turn_index,
            created_at: now,
        })
    }

    /// Get a message by rowid.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Message>> {
        let row = conn
            .query_row(
                "SELECT id, session_id, parent_id, role, content, attachments, steps,
                        agent, turn_index, created_at
                 FROM messages WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;
        row.transpose().map_err(StoreError::from)
    }

    /// List all messages in a session, in insertion (id) order.
    pub fn list_by_session(conn: &Connection, session_id: &str) -> Result<Vec<Message>> {
        let mut stmt = conn.prepare(
            "SELECT id, session_id, parent_id, role, content, attachments, steps,
                    agent, turn_index, created_at
             FROM messages WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Rowid of the most recent message in a session, if any.
    pub fn latest_id(conn: &Connection, session_id: &str) -> Result<Option<i64>> {
        let id: Option<i64> = conn.query_row(
            "SELECT MAX(id) FROM messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Map a row; JSON column decode errors surface as `serde_json::Error`.
    fn map_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<std::result::Result<Message, serde_json::Error>> {
        let id: i64 = row.get(0)?;
        let session_id: String = row.get(1)?;
        let parent_id: Option<i64> = row.get(2)?;
        let role: String = row.get(3)?;
        let content: String = row.get(4)?;
        let attachments_json: String = row.get(5)?;
        let steps_json: String = row.get(6)?;
        let agent: Option<String> = row.get(7)?;
        let turn_index: i64 = row.get(8)?;
        let created_at: String = row.get(9)?;

        let build = move || -> std::result::Result<Message, serde_json::Error> {
            let attachments: Vec<String> = serde_json::from_str(&attachments_json)?;
            let steps: Vec<StepRecord> = serde_json::from_str(&steps_json)?;
            Ok(Message {
                id,
                session_id: SessionId::from_string(session_id),
                parent_id,
                role: if role == "assistant" {
                    Role::Assistant
                } else {
                    Role::User
                },
                content,
                attachments,
                steps,
                agent,
                turn_index,
                created_at,
            })
        };
        Ok(build())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use crate::repositories::session::SessionRepo;
    use glyph_core::{StepKind, StepStatus};

    fn setup() -> (Connection, SessionId) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        let _ = run_migrations(&conn).unwrap();
        let session = SessionRepo::create(&conn, "t", None).unwrap();
        (conn, session.id)
    }

    fn user_msg(content: &str, parent_id: Option<i64>, turn_index: i64) -> NewMessage {
        NewMessage {
            parent_id,
            role: Role::User,
            content: content.into(),
            turn_index,
            ..Default::default()
        }
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let (conn, sid) = setup();
        let a = MessageRepo::insert(&conn, &sid, &user_msg("one", None, 0)).unwrap();
        let b = MessageRepo::insert(&conn, &sid, &user_msg("two", Some(a.id), 1)).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn insert_bumps_session_updated_at() {
        let (conn, sid) = setup();
        conn.execute(
            "UPDATE sessions SET updated_at = '2000-01-01T00:00:00Z' WHERE id = ?1",
            params![sid.as_str()],
        )
        .unwrap();
        let _ = MessageRepo::insert(&conn, &sid, &user_msg("hi", None, 0)).unwrap();
        let updated: String = conn
            .query_row(
                "SELECT updated_at FROM sessions WHERE id = ?1",
                params![sid.as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert_ne!(updated, "2000-01-01T00:00:00Z");
    }

    #[test]
    fn parent_must_be_in_same_session() {
        let (conn, sid) = setup();
        let other = SessionRepo::create(&conn, "other", None).unwrap();
        let foreign = MessageRepo::insert(&conn, &other.id, &user_msg("x", None, 0)).unwrap();

        let err = MessageRepo::insert(&conn, &sid, &user_msg("y", Some(foreign.id), 1)).unwrap_err();
        assert!(matches!(err, StoreError::ForeignParent { .. }));
    }

    #[test]
    fn missing_parent_rejected() {
        let (conn, sid) = setup();
        let err = MessageRepo::insert(&conn, &sid, &user_msg("y", Some(999), 1)).unwrap_err();
        assert!(matches!(err, StoreError::ForeignParent { .. }));
    }

    #[test]
    fn steps_roundtrip_through_json_column() {
        let (conn, sid) = setup();
        let new = NewMessage {
            role: Role::Assistant,
            steps: vec![
                StepRecord::now(StepKind::AgentSelect, "charts", "charts", StepStatus::Done),
                StepRecord::now(
                    StepKind::ToolEnd,
                    "create_chart",
                    "{\"series\":[]}",
                    StepStatus::Done,
                ),
            ],
            agent: Some("charts".into()),
            turn_index: 0,
            ..Default::default()
        };
        let inserted = MessageRepo::insert(&conn, &sid, &new).unwrap();
        let fetched = MessageRepo::get_by_id(&conn, inserted.id).unwrap().unwrap();
        assert_eq!(fetched.steps.len(), 2);
        assert_eq!(fetched.steps[1].kind, StepKind::ToolEnd);
        assert_eq!(fetched.agent.as_deref(), Some("charts"));
    }

    #[test]
    fn latest_id_tracks_inserts() {
        let (conn, sid) = setup();
        assert_eq!(MessageRepo::latest_id(&conn, sid.as_str()).unwrap(), None);
        let a = MessageRepo::insert(&conn, &sid, &user_msg("one", None, 0)).unwrap();
        let b = MessageRepo::insert(&conn, &sid, &user_msg("two", Some(a.id), 1)).unwrap();
        assert_eq!(
            MessageRepo::latest_id(&conn, sid.as_str()).unwrap(),
            Some(b.id)
        );
    }

    #[test]
    fn list_returns_insertion_order() {
        let (conn, sid) = setup();
        let a = MessageRepo::insert(&conn, &sid, &user_msg("one", None, 0)).unwrap();
        let b = MessageRepo::insert(&conn, &sid, &user_msg("two", Some(a.id), 1)).unwrap();
        let listed = MessageRepo::list_by_session(&conn, sid.as_str()).unwrap();
        assert_eq!(listed.iter().map(|m| m.id).collect::<Vec<_>>(), vec![a.id, b.id]);
    }
}
