//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the glyph server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Capacity of the per-request wire-event channel.
    pub event_buffer: usize,
    /// SSE keep-alive interval in seconds.
    pub keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            event_buffer: 64,
            keep_alive_secs: 15,
        }
    }
}
