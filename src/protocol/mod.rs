//! # Protocol
//!
//! Command routing on top of decoded frames.
//!
//! A session hands every decoded frame to the [`Dispatcher`](dispatcher::Dispatcher),
//! which looks up the handler registered for the frame's main command. The
//! handler's [`Reply`](dispatcher::Reply) tells the session what to write back
//! and whether to mark it authenticated.

pub mod command;
pub mod dispatcher;
pub mod handlers;

pub use command::{status, Command, LOGIN_AUTH, SIGN_DAY};
pub use dispatcher::{Dispatcher, Reply, SessionContext};

#[cfg(test)]
mod tests;
