//! # glyph-runtime
//!
//! The per-turn request pipeline for the diagram-chat backend.
//!
//! - [`context`] — branch-to-provider-messages assembly
//! - [`parser`] — incremental tag parser over structured agent output
//! - [`mux`] — wire-event multiplexing and the durable step trace
//! - [`provider`] — the agent invocation facade ([`AgentProvider`])
//! - [`pipeline`] — [`run_turn`], the whole turn end to end

pub mod context;
pub mod errors;
pub mod mux;
pub mod parser;
pub mod pipeline;
pub mod provider;

pub use context::ChatMessage;
pub use errors::RuntimeError;
pub use mux::TurnMux;
pub use parser::{ParseEvent, TagParser};
pub use pipeline::{TurnRequest, run_turn};
pub use provider::{AgentLabel, AgentProvider, AgentSignal, ProviderError, SignalStream};
