//! Context assembler — turns a resolved branch into provider messages.
//!
//! Assistant history entries carry their durable step trace rendered as a
//! synthetic "Execution Trace" block, so a re-invoked agent can see what
//! tools and agents fired previously without replaying side effects.

use glyph_core::{Message, Role, StepKind, StepRecord};

/// Placeholder lifted into empty content blocks — the provider fails hard
/// on empty content.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "[empty message]";

/// One role-tagged message handed to the agent provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Text content — never empty.
    pub content: String,
    /// Inlined image refs (data URLs).
    pub images: Vec<String>,
}

/// Assemble the provider message sequence for one turn.
///
/// Branch messages come first in turn order; the new user message is
/// appended last. Every entry with empty text is lifted to a placeholder.
#[must_use]
pub fn assemble(branch: &[Message], prompt: &str, images: &[String]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(branch.len() + 1);

    for msg in branch {
        let content = match msg.role {
            Role::User => msg.content.clone(),
            Role::Assistant => {
                let mut content = msg.content.clone();
                if let Some(trace) = render_trace(&msg.steps) {
                    if !content.is_empty() {
                        content.push_str("\n\n");
                    }
                    content.push_str(&trace);
                }
                content
            }
        };
        out.push(ChatMessage {
            role: msg.role,
            content: lift_empty(content),
            images: msg.attachments.clone(),
        });
    }

    out.push(ChatMessage {
        role: Role::User,
        content: lift_empty(prompt.to_owned()),
        images: images.to_vec(),
    });

    out
}

/// Render a step trace into the synthetic context block.
///
/// Each `tool_start` is paired with its following `tool_end` into one
/// line; an unmatched `tool_end` (defensive fallback) renders alone.
/// Returns `None` when no step produces a line.
#[must_use]
pub fn render_trace(steps: &[StepRecord]) -> Option<String> {
    let mut lines = Vec::new();
    let mut pending_start: Option<&StepRecord> = None;

    for step in steps {
        match step.kind {
            StepKind::AgentSelect => lines.push(format!("agentName: {}", step.content)),
            StepKind::ToolStart => pending_start = Some(step),
            StepKind::ToolEnd => match pending_start.take() {
                Some(start) => lines.push(format!(
                    "toolName: {}, toolArgs: {}, toolsOutput: {}",
                    start.name, start.content, step.content
                )),
                None => lines.push(format!(
                    "toolName: {}, toolsOutput: {}",
                    step.name, step.content
                )),
            },
            StepKind::AgentEnd | StepKind::DesignConcept | StepKind::DocAnalysis => {}
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(format!("### Execution Trace\n{}", lines.join("\n")))
    }
}

fn lift_empty(content: String) -> String {
    if content.is_empty() {
        EMPTY_CONTENT_PLACEHOLDER.to_owned()
    } else {
        content
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_core::{SessionId, StepStatus};

    fn message(role: Role, content: &str, steps: Vec<StepRecord>) -> Message {
        Message {
            id: 1,
            session_id: SessionId::from("s1"),
            parent_id: None,
            role,
            content: content.into(),
            attachments: vec![],
            steps,
            agent: None,
            turn_index: 0,
            created_at: chrono_now(),
        }
    }

    fn chrono_now() -> String {
        "2026-01-01T00:00:00Z".into()
    }

    fn step(kind: StepKind, name: &str, content: &str) -> StepRecord {
        StepRecord {
            kind,
            name: name.into(),
            content: content.into(),
            status: StepStatus::Done,
            timestamp: chrono_now(),
        }
    }

    #[test]
    fn trace_pairs_tool_start_with_tool_end() {
        let trace = render_trace(&[
            step(StepKind::ToolStart, "X", "A"),
            step(StepKind::ToolEnd, "X", "O"),
        ])
        .unwrap();
        assert_eq!(
            trace,
            "### Execution Trace\ntoolName: X, toolArgs: A, toolsOutput: O"
        );
    }

    #[test]
    fn trace_renders_agent_select() {
        let trace = render_trace(&[step(StepKind::AgentSelect, "charts", "charts")]).unwrap();
        assert!(trace.contains("agentName: charts"));
    }

    #[test]
    fn unmatched_tool_end_renders_alone() {
        let trace = render_trace(&[step(StepKind::ToolEnd, "X", "O")]).unwrap();
        assert!(trace.contains("toolName: X, toolsOutput: O"));
        assert!(!trace.contains("toolArgs"));
    }

    #[test]
    fn silent_steps_produce_no_trace() {
        assert!(render_trace(&[step(StepKind::DesignConcept, "", "rationale")]).is_none());
        assert!(render_trace(&[]).is_none());
    }

    #[test]
    fn assemble_appends_new_user_message_last() {
        let branch = vec![
            message(Role::User, "draw a chart", vec![]),
            message(Role::Assistant, "done", vec![]),
        ];
        let assembled = assemble(&branch, "make it red", &[]);
        assert_eq!(assembled.len(), 3);
        assert_eq!(assembled[2].role, Role::User);
        assert_eq!(assembled[2].content, "make it red");
    }

    #[test]
    fn assistant_content_gets_trace_block() {
        let branch = vec![message(
            Role::Assistant,
            "here you go",
            vec![
                step(StepKind::ToolStart, "create_chart", "{}"),
                step(StepKind::ToolEnd, "create_chart", "{\"series\":[]}"),
            ],
        )];
        let assembled = assemble(&branch, "next", &[]);
        assert!(assembled[0].content.starts_with("here you go\n\n### Execution Trace\n"));
        assert!(assembled[0].content.contains("toolName: create_chart"));
    }

    #[test]
    fn empty_assistant_content_with_trace_has_no_leading_gap() {
        let branch = vec![message(
            Role::Assistant,
            "",
            vec![
                step(StepKind::ToolStart, "create_chart", "{}"),
                step(StepKind::ToolEnd, "create_chart", "out"),
            ],
        )];
        let assembled = assemble(&branch, "next", &[]);
        assert!(assembled[0].content.starts_with("### Execution Trace"));
    }

    #[test]
    fn empty_content_is_lifted_to_placeholder() {
        let branch = vec![message(Role::Assistant, "", vec![])];
        let assembled = assemble(&branch, "", &[]);
        assert_eq!(assembled[0].content, EMPTY_CONTENT_PLACEHOLDER);
        assert_eq!(assembled[1].content, EMPTY_CONTENT_PLACEHOLDER);
    }

    #[test]
    fn attachments_are_inlined() {
        let mut msg = message(Role::User, "look", vec![]);
        msg.attachments = vec!["data:image/png;base64,AAA".into()];
        let assembled = assemble(&[msg], "next", &["data:image/png;base64,BBB".into()]);
        assert_eq!(assembled[0].images.len(), 1);
        assert_eq!(assembled[1].images[0], "data:image/png;base64,BBB");
    }
}
