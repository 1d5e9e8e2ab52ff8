//! Stateless repositories — every method takes `&Connection`.

pub mod message;
pub mod session;
