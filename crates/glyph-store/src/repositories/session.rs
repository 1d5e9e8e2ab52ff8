//! Session repository — session lifecycle.
//!
//! Sessions exclusively own their messages: deleting a session cascades
//! to its messages via the foreign key.

use rusqlite::{Connection, OptionalExtension, params};

use glyph_core::{Session, SessionId};

use crate::errors::Result;

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Create a new session.
    pub fn create(conn: &Connection, title: &str, owner: Option<&str>) -> Result<Session> {
        let id = SessionId::new();
        let now = chrono::Utc::now().to_rfc3339();

        let _ = conn.execute(
            "INSERT INTO sessions (id, title, owner, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id.as_str(), title, owner, now],
        )?;

        Ok(Session {
            id,
            title: title.to_owned(),
            owner: owner.map(String::from),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<Session>> {
        let row = conn
            .query_row(
                "SELECT id, title, owner, created_at, updated_at
                 FROM sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List sessions, most recently active first.
    pub fn list(conn: &Connection, limit: Option<i64>) -> Result<Vec<Session>> {
        let mut sql = String::from(
            "SELECT id, title, owner, created_at, updated_at
             FROM sessions ORDER BY updated_at DESC",
        );
        if let Some(limit) = limit {
            use std::fmt::Write;
            let _ = write!(sql, " LIMIT {limit}");
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Update the session title.
    pub fn update_title(conn: &Connection, session_id: &str, title: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET title = ?1 WHERE id = ?2",
            params![title, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a session. Messages cascade via the foreign key.
    pub fn delete(conn: &Connection, session_id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
        Ok(Session {
            id: SessionId::from_string(row.get::<_, String>(0)?),
            title: row.get(1)?,
            owner: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
