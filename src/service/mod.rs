//! # Service Layer
//!
//! Connection sessions, the auth watchdog that guards them, and a small async
//! client speaking the same wire format.

pub mod client;
pub mod session;
pub mod watchdog;

pub use client::GameClient;
pub use session::{Session, SessionId, SessionOptions, SessionReader, SessionState};
