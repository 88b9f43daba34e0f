//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the scheduler core:
//! - Logging and tracing infrastructure
//! - Scheduler configuration
//! - Scheduler lifecycle event bus
//!
//! ## Overview
//!
//! This crate contains the ambient runtime utilities the scheduler depends on.
//! It establishes the logging conventions, the configuration builder, and the
//! event broadcasting mechanism used by `core-scheduler` and its hosts.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
