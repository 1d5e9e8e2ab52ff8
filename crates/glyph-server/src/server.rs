//! `GlyphServer` — Axum HTTP server wiring.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, patch, post};
use tokio::net::TcpListener;

use glyph_runtime::AgentProvider;
use glyph_store::TurnStore;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::{chat, sessions};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The turn store.
    pub store: Arc<TurnStore>,
    /// The agent provider.
    pub provider: Arc<dyn AgentProvider>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// The main glyph server.
pub struct GlyphServer {
    config: ServerConfig,
    store: Arc<TurnStore>,
    provider: Arc<dyn AgentProvider>,
    start_time: Instant,
}

impl GlyphServer {
    /// Create a new server over a store and a provider.
    pub fn new(config: ServerConfig, store: Arc<TurnStore>, provider: Arc<dyn AgentProvider>) -> Self {
        Self {
            config,
            store,
            provider,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            store: self.store.clone(),
            provider: self.provider.clone(),
            config: Arc::new(self.config.clone()),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/chat/stream", post(chat::chat_stream))
            .route("/sessions", get(sessions::list_sessions))
            .route("/sessions/{id}/messages", get(sessions::list_messages))
            .route(
                "/sessions/{id}",
                patch(sessions::update_session).delete(sessions::delete_session),
            )
            .with_state(state)
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind and serve until ctrl-c.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "glyph server listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            })
            .await?;
        Ok(())
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state
        .store
        .list_sessions(None)
        .map(|sessions| sessions.len())
        .unwrap_or(0);
    Json(health::health_check(state.start_time, sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::provider::OfflineProvider;

    fn make_server() -> GlyphServer {
        let store = Arc::new(TurnStore::open_in_memory().unwrap());
        GlyphServer::new(
            ServerConfig::default(),
            store,
            Arc::new(OfflineProvider::default()),
        )
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_session_history_is_404() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/sessions/nope/messages")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_unknown_session_is_404() {
        let app = make_server().router();
        let req = Request::builder()
            .method("DELETE")
            .uri("/sessions/nope")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_sessions_is_empty_initially() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/sessions")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let sessions: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
        assert!(sessions.is_empty());
    }
}
