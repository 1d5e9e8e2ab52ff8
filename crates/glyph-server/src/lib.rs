//! # glyph-server
//!
//! Axum HTTP server for the diagram-chat backend.
//!
//! - [`server`] — router and [`server::GlyphServer`]
//! - [`chat`] — the `POST /chat/stream` SSE endpoint
//! - [`sessions`] — session listing, history, rename, delete
//! - [`provider`] — the offline stand-in [`provider::OfflineProvider`]

pub mod chat;
pub mod config;
pub mod errors;
pub mod health;
pub mod provider;
pub mod server;
pub mod sessions;

pub use config::ServerConfig;
pub use server::{AppState, GlyphServer};
