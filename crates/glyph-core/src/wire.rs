//! Outward wire-event catalogue.
//!
//! [`WireEvent`] enumerates every named event the backend can push to a
//! client over the per-request SSE stream. The string names and payload
//! shapes are wire-exact — the web client depends on them.
//!
//! Events are strictly ordered within one request (single producer); the
//! payload for session-scoped events always carries `session_id` so a
//! client multiplexing tabs can route them.

use serde_json::{Value, json};

use crate::ids::SessionId;
use crate::message::Role;

/// A named, ordered unit of the outward streaming protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum WireEvent {
    /// A new session was created for this conversation.
    SessionCreated {
        /// The created session.
        session_id: SessionId,
    },
    /// A message was durably written to the turn store.
    MessageCreated {
        /// Message rowid.
        id: i64,
        /// Author role.
        role: Role,
        /// Turn index of the message.
        turn_index: i64,
        /// Owning session.
        session_id: SessionId,
    },
    /// The classifier picked an agent for the turn.
    AgentSelected {
        /// Agent label.
        agent: String,
        /// Owning session.
        session_id: SessionId,
    },
    /// The agent finished its participation in the turn.
    AgentEnd {
        /// Agent label.
        agent: String,
        /// Owning session.
        session_id: SessionId,
    },
    /// Design-rationale streaming began.
    DesignConceptStart {
        /// Owning session.
        session_id: SessionId,
    },
    /// Incremental design-rationale text.
    DesignConcept {
        /// Newly streamed text (delta, never re-sent).
        content: String,
        /// Owning session.
        session_id: SessionId,
    },
    /// Design-rationale streaming completed.
    DesignConceptEnd {
        /// Owning session.
        session_id: SessionId,
    },
    /// A tool invocation (real or synthetic artifact generation) began.
    ToolStart {
        /// Tool name.
        tool: String,
        /// JSON snapshot of the tool input.
        input: Value,
        /// Owning session.
        session_id: SessionId,
    },
    /// Incremental artifact source text.
    ToolCode {
        /// Newly streamed text (delta, never re-sent).
        content: String,
        /// Owning session.
        session_id: SessionId,
    },
    /// A tool invocation completed.
    ToolEnd {
        /// Full accumulated output — not just the last delta.
        output: Value,
        /// Owning session.
        session_id: SessionId,
    },
    /// Incremental plain response text (unconstrained agent class only).
    Thought {
        /// Newly streamed text.
        content: String,
        /// Owning session.
        session_id: SessionId,
    },
    /// Human-readable progress note.
    Status {
        /// Progress text.
        content: String,
    },
    /// Terminal error — the stream ends after this event.
    Error {
        /// Error description.
        message: String,
    },
}

impl WireEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::MessageCreated { .. } => "message_created",
            Self::AgentSelected { .. } => "agent_selected",
            Self::AgentEnd { .. } => "agent_end",
            Self::DesignConceptStart { .. } => "design_concept_start",
            Self::DesignConcept { .. } => "design_concept",
            Self::DesignConceptEnd { .. } => "design_concept_end",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolCode { .. } => "tool_code",
            Self::ToolEnd { .. } => "tool_end",
            Self::Thought { .. } => "thought",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
        }
    }

    /// JSON payload for the event's `data:` line.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::SessionCreated { session_id } => json!({ "session_id": session_id }),
            Self::MessageCreated {
                id,
                role,
                turn_index,
                session_id,
            } => json!({
                "id": id,
                "role": role.as_str(),
                "turn_index": turn_index,
                "session_id": session_id,
            }),
            Self::AgentSelected { agent, session_id } | Self::AgentEnd { agent, session_id } => {
                json!({ "agent": agent, "session_id": session_id })
            }
            Self::DesignConceptStart { session_id } | Self::DesignConceptEnd { session_id } => {
                json!({ "session_id": session_id })
            }
            Self::DesignConcept {
                content,
                session_id,
            }
            | Self::ToolCode {
                content,
                session_id,
            }
            | Self::Thought {
                content,
                session_id,
            } => json!({ "content": content, "session_id": session_id }),
            Self::ToolStart {
                tool,
                input,
                session_id,
            } => json!({ "tool": tool, "input": input, "session_id": session_id }),
            Self::ToolEnd { output, session_id } => {
                json!({ "output": output, "session_id": session_id })
            }
            Self::Status { content } => json!({ "content": content }),
            Self::Error { message } => json!({ "message": message }),
        }
    }
}

/// All wire-event names, for exhaustive testing.
pub const ALL_WIRE_EVENT_NAMES: &[&str] = &[
    "session_created",
    "message_created",
    "agent_selected",
    "agent_end",
    "design_concept_start",
    "design_concept",
    "design_concept_end",
    "tool_start",
    "tool_code",
    "tool_end",
    "thought",
    "status",
    "error",
];

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
