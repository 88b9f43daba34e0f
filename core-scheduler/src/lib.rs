//! # Core Scheduler Module
//!
//! Cooperative, priority-driven active object scheduling for one OS thread at
//! a time.
//!
//! ## Overview
//!
//! This crate provides:
//! - Counting semaphore and mutex primitives with an explicit lifecycle
//! - A lock-guarded, semaphore-gated ready queue shared across threads
//! - A deadline-ordered timer queue tolerant of tick counter rollover
//! - Active objects owning a single outstanding request
//! - The per-thread scheduler with blocking and non-blocking run modes
//!
//! Requests can be completed from any thread; handlers always run on the
//! scheduler's own thread, one at a time, highest priority first.

pub mod active;
pub mod error;
pub mod observer;
pub mod order;
pub mod pqueue;
pub mod ready_queue;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod sync;
pub mod thread_context;
pub mod timer_queue;

pub use active::{
    ActiveHandler, ActiveObject, RunResult, RunStats, PRIORITY_HIGH, PRIORITY_HIGHEST, PRIORITY_IDLE,
    PRIORITY_LOW, PRIORITY_NOMINAL,
};
pub use error::{ProcError, Result, SchedError};
pub use observer::SchedulerObserver;
pub use ready_queue::ReadyQueue;
pub use scheduler::Scheduler;
pub use status::{CompletionHint, RequestStatus};
pub use sync::{Mutex, Semaphore, ThreadLock};
pub use thread_context::ThreadContext;
pub use timer_queue::TimerQueue;
