//! Turn multiplexer — folds parse events and agent signals into wire
//! events and the durable step trace.
//!
//! One [`TurnMux`] lives for one assistant turn. It owns the step trace
//! that will be persisted on the assistant message, accumulates the full
//! rationale/artifact/thought text, and translates every inbound event
//! into zero or more [`WireEvent`]s in arrival order.

use serde_json::{Value, json};

use glyph_core::{SessionId, StepKind, StepRecord, StepStatus, WireEvent};

use crate::parser::ParseEvent;
use crate::provider::{AgentLabel, AgentSignal};

/// Fallback tool name for an agent without a declared artifact tool.
const GENERIC_ARTIFACT_TOOL: &str = "create_artifact";

/// Per-turn event multiplexer and step-trace accumulator.
pub struct TurnMux {
    session_id: SessionId,
    agent: AgentLabel,
    steps: Vec<StepRecord>,
    rationale: String,
    artifact: String,
    thought: String,
    tool_open: bool,
}

impl TurnMux {
    /// Create a multiplexer for one turn routed to `agent`.
    #[must_use]
    pub fn new(session_id: SessionId, agent: AgentLabel) -> Self {
        Self {
            session_id,
            agent,
            steps: Vec::new(),
            rationale: String::new(),
            artifact: String::new(),
            thought: String::new(),
            tool_open: false,
        }
    }

    /// Agent label this turn was routed to.
    #[must_use]
    pub fn agent(&self) -> AgentLabel {
        self.agent
    }

    /// Step trace accumulated so far.
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Consume the multiplexer, returning the final step trace.
    #[must_use]
    pub fn into_steps(self) -> Vec<StepRecord> {
        self.steps
    }

    /// Full accumulated artifact text.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Text content to persist on the assistant message: the plain
    /// response for the unconstrained agent class, empty otherwise (the
    /// artifact lives in the `tool_end` step, not the message body).
    #[must_use]
    pub fn persisted_content(&self) -> &str {
        match self.agent {
            AgentLabel::General => &self.thought,
            _ => "",
        }
    }

    /// Record the classifier decision and announce it.
    pub fn agent_selected(&mut self) -> WireEvent {
        let label = self.agent.as_str();
        self.steps.push(StepRecord::now(
            StepKind::AgentSelect,
            label,
            label,
            StepStatus::Done,
        ));
        WireEvent::AgentSelected {
            agent: label.to_owned(),
            session_id: self.session_id.clone(),
        }
    }

    /// Fold one parse event from the structured-output parser.
    pub fn on_parse(&mut self, ev: ParseEvent) -> Vec<WireEvent> {
        match ev {
            ParseEvent::RationaleStart => vec![WireEvent::DesignConceptStart {
                session_id: self.session_id.clone(),
            }],
            ParseEvent::RationaleDelta(delta) => {
                self.rationale.push_str(&delta);
                vec![WireEvent::DesignConcept {
                    content: delta,
                    session_id: self.session_id.clone(),
                }]
            }
            ParseEvent::RationaleEnd => {
                self.steps.push(StepRecord::now(
                    StepKind::DesignConcept,
                    "design_concept",
                    self.rationale.clone(),
                    StepStatus::Done,
                ));
                vec![WireEvent::DesignConceptEnd {
                    session_id: self.session_id.clone(),
                }]
            }
            ParseEvent::ArtifactStart => {
                self.tool_open = true;
                let tool = self.tool_name();
                let input = json!({ "agent": self.agent.as_str() });
                self.steps.push(StepRecord::now(
                    StepKind::ToolStart,
                    tool,
                    input.to_string(),
                    StepStatus::Running,
                ));
                vec![WireEvent::ToolStart {
                    tool: tool.to_owned(),
                    input,
                    session_id: self.session_id.clone(),
                }]
            }
            ParseEvent::ArtifactDelta(delta) => {
                self.artifact.push_str(&delta);
                vec![WireEvent::ToolCode {
                    content: delta,
                    session_id: self.session_id.clone(),
                }]
            }
            ParseEvent::ArtifactEnd => {
                if !self.tool_open {
                    return Vec::new();
                }
                self.tool_open = false;
                self.steps.push(StepRecord::now(
                    StepKind::ToolEnd,
                    self.tool_name(),
                    self.artifact.clone(),
                    StepStatus::Done,
                ));
                vec![WireEvent::ToolEnd {
                    output: Value::String(self.artifact.clone()),
                    session_id: self.session_id.clone(),
                }]
            }
        }
    }

    /// Fold one raw agent signal (unconstrained text, or a real tool
    /// invocation reported by the agent itself).
    pub fn on_signal(&mut self, sig: AgentSignal) -> Vec<WireEvent> {
        match sig {
            AgentSignal::TextDelta(delta) => {
                self.thought.push_str(&delta);
                vec![WireEvent::Thought {
                    content: delta,
                    session_id: self.session_id.clone(),
                }]
            }
            AgentSignal::ToolStart { name, input } => {
                self.steps.push(StepRecord::now(
                    StepKind::ToolStart,
                    name.clone(),
                    input.to_string(),
                    StepStatus::Running,
                ));
                vec![WireEvent::ToolStart {
                    tool: name,
                    input,
                    session_id: self.session_id.clone(),
                }]
            }
            AgentSignal::ToolEnd { name, output } => {
                self.steps.push(StepRecord::now(
                    StepKind::ToolEnd,
                    name,
                    output.to_string(),
                    StepStatus::Done,
                ));
                vec![WireEvent::ToolEnd {
                    output,
                    session_id: self.session_id.clone(),
                }]
            }
        }
    }

    /// Close out the turn: record the agent end and announce it.
    pub fn finish(&mut self) -> WireEvent {
        let label = self.agent.as_str();
        self.steps.push(StepRecord::now(
            StepKind::AgentEnd,
            label,
            label,
            StepStatus::Done,
        ));
        WireEvent::AgentEnd {
            agent: label.to_owned(),
            session_id: self.session_id.clone(),
        }
    }

    fn tool_name(&self) -> &'static str {
        self.agent.tool_name().unwrap_or(GENERIC_ARTIFACT_TOOL)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
