//! Workspace placeholder crate.
//!
//! This crate exposes the `scheduler` feature, which maps to the
//! `core-scheduler` and `core-runtime` workspace crates. Host applications can
//! depend on `pvsched-workspace` and reach the scheduler without wiring each
//! crate individually.

#[cfg(feature = "scheduler")]
pub use core_runtime as runtime;
#[cfg(feature = "scheduler")]
pub use core_scheduler as scheduler;
