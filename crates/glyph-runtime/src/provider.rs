//! Agent invocation facade — the boundary to the external LLM system.
//!
//! The pipeline never talks to a model directly. It consumes an
//! [`AgentProvider`]: an intent classifier plus a per-agent generation
//! stream of [`AgentSignal`]s. Prompt text, model selection, and provider
//! failover all live behind this trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::context::ChatMessage;

/// Errors surfaced by an agent provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The upstream API call failed.
    #[error("API error: {0}")]
    Api(String),

    /// The upstream stream was cancelled.
    #[error("Stream cancelled")]
    Cancelled,
}

/// One signal from a generation stream.
///
/// Most agents only emit text deltas; agents that run their own tools
/// report start/end pairs with JSON-serializable snapshots (the facade
/// stringifies anything that isn't).
#[derive(Clone, Debug, PartialEq)]
pub enum AgentSignal {
    /// Incremental response text.
    TextDelta(String),
    /// An agent-internal tool invocation began.
    ToolStart {
        /// Declared tool name.
        name: String,
        /// Input snapshot.
        input: Value,
    },
    /// An agent-internal tool invocation completed.
    ToolEnd {
        /// Declared tool name.
        name: String,
        /// Output snapshot.
        output: Value,
    },
}

/// A pinned, boxed stream of agent signals.
pub type SignalStream = Pin<Box<dyn Stream<Item = Result<AgentSignal, ProviderError>> + Send>>;

/// Opaque external collaborator: classify an intent, then stream a
/// generation for the selected agent.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Classify the user's intent into an agent label string.
    ///
    /// The classifier's own token stream (if any) never leaves the
    /// provider — only the final label does.
    async fn classify(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;

    /// Start a generation stream for the selected agent.
    async fn stream(
        &self,
        agent: AgentLabel,
        messages: &[ChatMessage],
    ) -> Result<SignalStream, ProviderError>;
}

/// The fixed set of diagram agents a request can be routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentLabel {
    /// Markdown mindmaps.
    Mindmap,
    /// Mermaid flowcharts.
    Flow,
    /// ECharts data visualizations.
    Charts,
    /// Raw Mermaid diagrams.
    Mermaid,
    /// Draw.io XML diagrams.
    Drawio,
    /// AntV infographic DSL.
    Infographic,
    /// Unconstrained conversational fallback.
    General,
}

impl AgentLabel {
    /// Map a raw classifier output to a label.
    ///
    /// Unmappable output falls back to [`AgentLabel::General`] — the
    /// least-surprising choice — rather than failing the request.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        if raw.contains("mindmap") {
            Self::Mindmap
        } else if raw.contains("flow") {
            Self::Flow
        } else if raw.contains("chart") {
            Self::Charts
        } else if raw.contains("mermaid") {
            Self::Mermaid
        } else if raw.contains("drawio") {
            Self::Drawio
        } else if raw.contains("infographic") {
            Self::Infographic
        } else {
            Self::General
        }
    }

    /// Wire label string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mindmap => "mindmap",
            Self::Flow => "flow",
            Self::Charts => "charts",
            Self::Mermaid => "mermaid",
            Self::Drawio => "drawio",
            Self::Infographic => "infographic",
            Self::General => "general",
        }
    }

    /// Name of the synthetic artifact-generation tool for this agent,
    /// or `None` for the unconstrained class (it produces no artifact).
    #[must_use]
    pub fn tool_name(self) -> Option<&'static str> {
        match self {
            Self::Mindmap => Some("create_mindmap"),
            Self::Flow => Some("create_flowchart"),
            Self::Charts => Some("create_chart"),
            Self::Mermaid => Some("create_mermaid"),
            Self::Drawio => Some("create_drawio"),
            Self::Infographic => Some("create_infographic"),
            Self::General => None,
        }
    }
}

impl std::fmt::Display for AgentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
