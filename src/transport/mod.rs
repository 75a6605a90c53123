//! # Transport
//!
//! The TCP acceptor, the registry of live sessions and the process signals
//! that start a graceful shutdown.

pub mod registry;
pub mod signal;
pub mod tcp;

pub use registry::Registry;
pub use tcp::Server;
