//! # Game Gateway
//!
//! Persistent-connection TCP gateway for game clients speaking a small
//! fixed-header binary protocol.
//!
//! The server splits each inbound byte stream on a delimiter, validates every
//! frame, gates unauthenticated connections behind a timeout and shuts down
//! gracefully: on a signal it stops accepting, drains in-flight writes (bounded)
//! and removes every session from the registry before returning.
//!
//! ## Layout
//! - [`core`]: frame decoding and the stream codec
//! - [`protocol`]: command dispatch and the built-in handlers
//! - [`service`]: sessions, the auth watchdog and a client
//! - [`transport`]: the acceptor, the session registry and signal handling
//! - [`store`]: account store and token cache interfaces with in-memory implementations
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use game_gateway::config::NetworkConfig;
//! use game_gateway::protocol::Dispatcher;
//! use game_gateway::store::TokenCache;
//! use game_gateway::transport::Server;
//!
//! # async fn run() -> game_gateway::error::Result<()> {
//! let config = NetworkConfig::default();
//! let cache = Arc::new(TokenCache::from_config(&config.cache));
//! let dispatcher = Arc::new(Dispatcher::with_builtin_commands(cache)?);
//!
//! Server::new(config.server, dispatcher).start().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod store;
pub mod transport;
pub mod utils;

pub use crate::core::frame::Frame;
pub use error::{ProtocolError, Result};
