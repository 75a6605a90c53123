//! # Error Types
//!
//! Error handling for the gateway.
//!
//! This module defines every error variant that can occur while accepting
//! connections, framing inbound bytes, dispatching commands and talking to the
//! account and token collaborators.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures
//! - **Listen Errors**: bind/accept failures, fatal to the acceptor
//! - **Protocol Violations**: bad magic, malformed body, truncated or oversized frames.
//!   A violation always ends the connection it occurred on.
//! - **Dispatch Errors**: unknown commands, unauthenticated requests. Logged, never terminal.
//! - **Store Errors**: account and credential failures
//!
//! ## Example Usage
//! ```rust
//! use game_gateway::core::frame::Frame;
//! use game_gateway::error::ProtocolError;
//!
//! let err = Frame::decode(&[0u8; 4]).unwrap_err();
//! assert!(matches!(err, ProtocolError::TruncatedFrame(4)));
//! assert!(err.is_protocol_violation());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Account validation errors
    pub const ERR_ACCOUNT_LENGTH: &str = "Account name must be exactly 11 characters";
    pub const ERR_PASSWORD_LENGTH: &str = "Password must be at least 6 characters";
    pub const ERR_PASSWORD_EQUALS_ACCOUNT: &str = "Password must differ from the account name";
}

// ProtocolError is the primary error type for all gateway operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Listen error: {0}")]
    Listen(#[source] io::Error),

    #[error("Bad magic value: {0:#010x}")]
    BadMagic(u32),

    #[error("Malformed frame body: {0} bytes is not a multiple of 8")]
    MalformedBody(usize),

    #[error("Truncated frame: {0} bytes")]
    TruncatedFrame(usize),

    #[error("Frame is not terminated by the delimiter")]
    MissingDelimiter,

    #[error("Declared frame length {declared} does not match actual length {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Unknown command: {0}")]
    UnknownCommand(u32),

    #[error("Session is not authenticated")]
    Unauthenticated,

    #[error("Invalid account: {0}")]
    InvalidAccount(&'static str),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error means the inbound byte stream can no longer be trusted.
    ///
    /// Violations are terminal for the connection they occur on.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::BadMagic(_)
                | ProtocolError::MalformedBody(_)
                | ProtocolError::TruncatedFrame(_)
                | ProtocolError::MissingDelimiter
                | ProtocolError::LengthMismatch { .. }
                | ProtocolError::OversizedFrame(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
