//! End-to-end SSE tests: a scripted provider drives `POST /chat/stream`
//! through the full pipeline and the events come back over the wire.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use glyph_runtime::provider::{AgentLabel, AgentProvider, AgentSignal, ProviderError, SignalStream};
use glyph_runtime::ChatMessage;
use glyph_server::provider::OfflineProvider;
use glyph_server::{GlyphServer, ServerConfig};
use glyph_store::TurnStore;

struct ScriptedProvider {
    label: &'static str,
    chunks: Vec<&'static str>,
}

#[async_trait]
impl AgentProvider for ScriptedProvider {
    async fn classify(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
        Ok(self.label.to_owned())
    }

    async fn stream(
        &self,
        _agent: AgentLabel,
        _messages: &[ChatMessage],
    ) -> Result<SignalStream, ProviderError> {
        let chunks = self.chunks.clone();
        Ok(Box::pin(async_stream::stream! {
            for chunk in chunks {
                yield Ok(AgentSignal::TextDelta(chunk.to_owned()));
            }
        }))
    }
}

fn make_server(provider: Arc<dyn AgentProvider>) -> GlyphServer {
    let store = Arc::new(TurnStore::open_in_memory().unwrap());
    GlyphServer::new(ServerConfig::default(), store, provider)
}

async fn post_chat(server: &GlyphServer, body: Value) -> Vec<(String, Value)> {
    let req = Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = server.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    parse_sse(std::str::from_utf8(&bytes).unwrap())
}

/// Parse an SSE body into (event name, data payload) pairs.
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    let mut events = Vec::new();
    for block in body.split("\n\n") {
        let mut name = None;
        let mut data = None;
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                name = Some(rest.trim().to_owned());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data = Some(rest.trim().to_owned());
            }
            // Comment lines (keep-alive pings) are skipped.
        }
        if let (Some(name), Some(data)) = (name, data) {
            events.push((name, serde_json::from_str(&data).unwrap()));
        }
    }
    events
}

async fn get_messages(server: &GlyphServer, session_id: &str) -> Vec<Value> {
    let req = Request::builder()
        .uri(format!("/sessions/{session_id}/messages"))
        .body(Body::empty())
        .unwrap();
    let resp = server.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn structured_turn_over_the_wire() {
    // Markers and escapes split across chunks on purpose.
    let provider = Arc::new(ScriptedProvider {
        label: "charts",
        chunks: vec![
            "<design_con",
            "cept>A bar chart\\nof sales.</design_concept><co",
            "de>{\\\"type\\\": \\",
            "\"bar\\\"}</code>",
        ],
    });
    let server = make_server(provider);
    let events = post_chat(&server, json!({ "prompt": "sales chart please" })).await;

    // Delta granularity depends on chunking; order does not.
    let mut collapsed: Vec<&str> = Vec::new();
    for (name, _) in &events {
        if collapsed.last() != Some(&name.as_str()) {
            collapsed.push(name.as_str());
        }
    }
    assert_eq!(
        collapsed,
        vec![
            "session_created",
            "message_created",
            "status",
            "agent_selected",
            "design_concept_start",
            "design_concept",
            "design_concept_end",
            "tool_start",
            "tool_code",
            "tool_end",
            "agent_end",
            "message_created",
        ]
    );

    let session_id = events[0].1["session_id"].as_str().unwrap().to_owned();
    // Session-scoped payloads all carry the session id.
    for (name, data) in &events {
        if name != "status" && name != "error" {
            assert_eq!(data["session_id"].as_str().unwrap(), session_id, "{name}");
        }
    }

    let (_, agent_selected) = events.iter().find(|(n, _)| n == "agent_selected").unwrap();
    assert_eq!(agent_selected["agent"], "charts");
    let (_, tool_end) = events.iter().find(|(n, _)| n == "tool_end").unwrap();
    assert_eq!(tool_end["output"], "{\"type\": \"bar\"}");

    // Deltas concatenate to the full decoded rationale.
    let rationale: String = events
        .iter()
        .filter(|(n, _)| n == "design_concept")
        .map(|(_, d)| d["content"].as_str().unwrap())
        .collect();
    assert_eq!(rationale, "A bar chart\nof sales.");

    // And the durable record agrees with the wire.
    let messages = get_messages(&server, &session_id).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["agent"], "charts");
    let steps = messages[1]["steps"].as_array().unwrap();
    let tool_end_step = steps
        .iter()
        .find(|s| s["type"] == "tool_end")
        .unwrap();
    assert_eq!(tool_end_step["content"], "{\"type\": \"bar\"}");
}

#[tokio::test]
async fn continuation_and_retry_over_the_wire() {
    let provider = Arc::new(ScriptedProvider {
        label: "general",
        chunks: vec!["a reply"],
    });
    let server = make_server(provider);

    let first = post_chat(&server, json!({ "prompt": "turn one" })).await;
    let session_id = first[0].1["session_id"].as_str().unwrap().to_owned();

    // Plain continuation: no parent_id, anchors at the latest message.
    let _ = post_chat(
        &server,
        json!({ "session_id": session_id, "prompt": "turn two" }),
    )
    .await;
    let messages = get_messages(&server, &session_id).await;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["turn_index"], 2);
    assert_eq!(messages[3]["turn_index"], 3);

    // Retry of the first user turn: sibling at turn 0.
    let first_user_id = messages[0]["id"].as_i64().unwrap();
    let retry = post_chat(
        &server,
        json!({
            "session_id": session_id,
            "prompt": "turn one, take two",
            "parent_id": first_user_id,
            "is_retry": true,
        }),
    )
    .await;
    // An existing session emits no session_created.
    assert_ne!(retry[0].0, "session_created");

    let messages = get_messages(&server, &session_id).await;
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[4]["turn_index"], 0);
    assert!(messages[4]["parent_id"].is_null());
    assert_eq!(messages[5]["turn_index"], 1);
}

#[tokio::test]
async fn unknown_session_yields_error_event() {
    let provider = Arc::new(ScriptedProvider {
        label: "general",
        chunks: vec![],
    });
    let server = make_server(provider);
    let events = post_chat(
        &server,
        json!({ "session_id": "no-such-session", "prompt": "hi" }),
    )
    .await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "error");
    assert!(
        events[0].1["message"]
            .as_str()
            .unwrap()
            .contains("no-such-session")
    );
}

#[tokio::test]
async fn offline_provider_serves_a_full_turn() {
    let server = make_server(Arc::new(OfflineProvider));
    let events = post_chat(&server, json!({ "prompt": "draw a flowchart of login" })).await;
    let names: Vec<&str> = events.iter().map(|(n, _)| n.as_str()).collect();
    assert!(names.contains(&"agent_selected"));
    assert!(names.contains(&"tool_end"));
    let (_, selected) = events.iter().find(|(n, _)| n == "agent_selected").unwrap();
    assert_eq!(selected["agent"], "flow");
}
