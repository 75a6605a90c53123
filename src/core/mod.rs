//! # Core Protocol Components
//!
//! Low-level frame handling and stream framing.
//!
//! This module provides the foundation for the protocol: validating and decoding
//! delimited frames, and splitting a TCP byte stream into them.
//!
//! ## Components
//! - **Frame**: fixed-header binary frame with an 8-byte-aligned body
//! - **Codec**: Tokio codec splitting byte streams on the frame delimiter
//!
//! ## Wire Format
//! ```text
//! [Magic(4)] [Length(4)] [Identity(8)] [Main(4)] [Sub(4)] [Encryption(4)] [Body(N*8)] [Delimiter(1)]
//! ```
//!
//! ## Safety Limits
//! - Maximum raw frame size is bounded (default 64 KB) so a peer that never
//!   sends a delimiter cannot exhaust memory
//! - Magic value and body alignment are checked before anything is dispatched

pub mod codec;
pub mod frame;
