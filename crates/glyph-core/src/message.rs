//! Sessions, messages, and durable step records.
//!
//! A [`Message`] is one entry in a session's append-only log. Messages
//! carry a `turn_index` (root messages are turn 0; every child is its
//! parent's turn plus one) and a weak `parent_id` back-reference. Several
//! messages may share a turn index — those are alternate branches created
//! by retries, and the one with the greatest id is the active one.
//!
//! [`StepRecord`]s are the durable trace of everything that happened while
//! an assistant message was produced (agent selection, tool invocations,
//! design rationale). They are stored on the assistant message and later
//! rendered back into conversation context as an execution-trace block.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human-authored message.
    User,
    /// Agent-authored message.
    Assistant,
}

impl Role {
    /// Wire string for this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Kind of a durable step in an assistant message's trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// The classifier picked an agent for the turn.
    AgentSelect,
    /// A tool invocation began.
    ToolStart,
    /// A tool invocation completed.
    ToolEnd,
    /// The agent finished its participation in the turn.
    AgentEnd,
    /// The design rationale streamed by a structured agent.
    DesignConcept,
    /// Document analysis output attached to the turn.
    DocAnalysis,
}

/// Completion status of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step is in progress.
    Running,
    /// Step finished successfully.
    Done,
    /// Step finished with an error.
    Error,
}

/// One durable step in an assistant message's execution trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step variant.
    #[serde(rename = "type")]
    pub kind: StepKind,
    /// Tool or agent name.
    pub name: String,
    /// Step payload — tool args for `tool_start`, tool output for
    /// `tool_end`, rationale text for `design_concept`.
    pub content: String,
    /// Completion status.
    pub status: StepStatus,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl StepRecord {
    /// Create a step stamped with the current time.
    #[must_use]
    pub fn now(kind: StepKind, name: impl Into<String>, content: impl Into<String>, status: StepStatus) -> Self {
        Self {
            kind,
            name: name.into(),
            content: content.into(),
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A chat session — exclusive owner of its messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID.
    pub id: SessionId,
    /// Display title (derived from the first prompt).
    pub title: String,
    /// Optional owner identity.
    pub owner: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last message append.
    pub updated_at: String,
}

/// One persisted message in a session's log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Rowid — integer ordering defines branch precedence.
    pub id: i64,
    /// Owning session.
    pub session_id: SessionId,
    /// Weak back-reference to the parent message, if any.
    pub parent_id: Option<i64>,
    /// Author role.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Ordered image refs (data URLs) attached to the message.
    pub attachments: Vec<String>,
    /// Execution trace (assistant messages only).
    pub steps: Vec<StepRecord>,
    /// Agent label that produced the message (assistant only).
    pub agent: Option<String>,
    /// Turn index — `parent.turn_index + 1`, or 0 for roots.
    pub turn_index: i64,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Fields for appending a new message.
#[derive(Clone, Debug, Default)]
pub struct NewMessage {
    /// Weak back-reference to the parent message, if any.
    pub parent_id: Option<i64>,
    /// Author role.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Ordered image refs.
    pub attachments: Vec<String>,
    /// Execution trace (assistant messages only).
    pub steps: Vec<StepRecord>,
    /// Agent label (assistant only).
    pub agent: Option<String>,
    /// Turn index.
    pub turn_index: i64,
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
