//! # Utility Modules
//!
//! Supporting utilities for in-flight tracking, logging, metrics and timing.
//!
//! ## Components
//! - **Drain**: bounded-wait counter of in-flight operations per connection
//! - **Logging**: `tracing-subscriber` setup from configuration
//! - **Metrics**: thread-safe observability counters
//! - **Timeout**: default durations and async timeout wrappers

pub mod drain;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use drain::{DrainCounter, DrainGuard};
