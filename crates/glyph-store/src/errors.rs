//! Turn store error types.

/// Errors from the turn store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying `SQLite` error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A JSON column failed to (de)serialize.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("Migration {version} failed: {message}")]
    Migration {
        /// Migration version that failed.
        version: u32,
        /// Failure description.
        message: String,
    },

    /// Session does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A message's parent reference points outside its session.
    #[error("Parent message {parent_id} is not in session {session_id}")]
    ForeignParent {
        /// The offending parent id.
        parent_id: i64,
        /// The session the child belongs to.
        session_id: String,
    },
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
