//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the scheduler runtime and
//! platform-specific implementations. Each trait represents a capability the
//! runtime requires but that must be implemented differently per platform.
//!
//! ## Traits
//!
//! - [`TickSource`](time::TickSource) - Wrapping monotonic tick counter used
//!   for timer deadlines
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling.
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync`: a tick source is read by every
//! scheduler thread and by foreign threads completing requests.

pub mod error;
pub mod time;

pub use error::BridgeError;

pub use time::{
    ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualTickSource, SystemTickSource, TickSource,
};
