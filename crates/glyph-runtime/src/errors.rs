//! Runtime error types.

use crate::provider::ProviderError;

/// Errors that can occur while running one chat turn.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Agent provider error (classification or generation stream).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Turn store error.
    #[error("Store error: {0}")]
    Store(#[from] glyph_store::Error),

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The client disconnected and the turn was cancelled.
    #[error("Turn cancelled")]
    Cancelled,

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Error category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::Store(_) => "store",
            Self::SessionNotFound(_) => "session_not_found",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}
