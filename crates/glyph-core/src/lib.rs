//! # glyph-core
//!
//! Domain types shared across the glyph backend:
//!
//! - Branded session IDs ([`ids`])
//! - Sessions, messages, and durable step records ([`message`])
//! - The outward wire-event catalogue ([`wire`])
//! - Tracing subscriber setup ([`logging`])

pub mod ids;
pub mod logging;
pub mod message;
pub mod wire;

pub use ids::SessionId;
pub use message::{Message, NewMessage, Role, Session, StepKind, StepRecord, StepStatus};
pub use wire::WireEvent;
