//! Offline agent provider.
//!
//! A deterministic stand-in used by the binary when no model backend is
//! wired up: classification is keyword routing over the prompt, and the
//! generation stream replays a placeholder payload in small chunks so
//! the whole streaming path (parser included) is exercised end to end.

use async_trait::async_trait;

use glyph_runtime::provider::{AgentLabel, AgentProvider, AgentSignal, ProviderError, SignalStream};
use glyph_runtime::ChatMessage;

/// Characters per streamed chunk.
const CHUNK_CHARS: usize = 12;

/// Keyword-routed, canned-output provider.
#[derive(Debug, Default)]
pub struct OfflineProvider;

#[async_trait]
impl AgentProvider for OfflineProvider {
    async fn classify(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let prompt = messages
            .last()
            .map(|m| m.content.to_ascii_lowercase())
            .unwrap_or_default();
        let label = if prompt.contains("mindmap") || prompt.contains("mind map") {
            "mindmap"
        } else if prompt.contains("flowchart") || prompt.contains("flow") {
            "flow"
        } else if prompt.contains("chart") || prompt.contains("plot") || prompt.contains("graph") {
            "charts"
        } else if prompt.contains("mermaid") {
            "mermaid"
        } else if prompt.contains("drawio") || prompt.contains("draw.io") {
            "drawio"
        } else if prompt.contains("infographic") {
            "infographic"
        } else {
            "general"
        };
        Ok(label.to_owned())
    }

    async fn stream(
        &self,
        agent: AgentLabel,
        messages: &[ChatMessage],
    ) -> Result<SignalStream, ProviderError> {
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let text = match agent {
            AgentLabel::General => format!(
                "I can help with that. You asked: {prompt}. \
                 Ask for a chart, flowchart, or mindmap to get a diagram."
            ),
            _ => tagged_payload(agent, &prompt),
        };
        let chunks = chunk(&text);
        Ok(Box::pin(async_stream::stream! {
            for piece in chunks {
                yield Ok(AgentSignal::TextDelta(piece));
            }
        }))
    }
}

/// Build the structured `<design_concept>…<code>…` payload with
/// JSON-style escaping, as a model would emit it.
fn tagged_payload(agent: AgentLabel, prompt: &str) -> String {
    let concept = format!("A placeholder {agent} diagram for: {prompt}");
    let artifact = match agent {
        AgentLabel::Flow | AgentLabel::Mermaid => {
            "graph TD\n  A[Request] --> B[Placeholder]".to_owned()
        }
        AgentLabel::Mindmap => format!("# {prompt}\n- idea one\n- idea two"),
        _ => format!("{{\"type\": \"placeholder\", \"prompt\": {}}}", json_quote(prompt)),
    };
    format!(
        "<design_concept>{}</design_concept><code>{}</code>",
        json_escape(&concept),
        json_escape(&artifact)
    )
}

/// Escape a string the way it appears inside a JSON string value.
fn json_escape(s: &str) -> String {
    let quoted = json_quote(s);
    quoted[1..quoted.len() - 1].to_owned()
}

fn json_quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_owned())
}

fn chunk(text: &str) -> Vec<String> {
    text.chars()
        .collect::<Vec<_>>()
        .chunks(CHUNK_CHARS)
        .map(|c| c.iter().collect())
        .collect()
}
