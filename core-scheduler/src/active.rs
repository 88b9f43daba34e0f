//! # Active Objects
//!
//! An active object is a unit of cooperative asynchronous work. It owns
//! exactly one request at a time: the owner arms the request
//! ([`pend_for_exec`](ActiveObject::pend_for_exec) or
//! [`after`](ActiveObject::after)), someone completes it
//! ([`pend_complete`](ActiveObject::pend_complete), possibly from another
//! thread), and the scheduler dispatches the object's [`ActiveHandler::run`]
//! on its own thread.
//!
//! ## Usage
//!
//! ```ignore
//! use core_scheduler::{ActiveHandler, ActiveObject, RunResult, PRIORITY_NOMINAL};
//! use std::sync::Arc;
//!
//! struct Decode;
//!
//! impl ActiveHandler for Decode {
//!     fn run(&self, active: &Arc<ActiveObject>) -> RunResult {
//!         tracing::debug!(status = %active.status(), "frame ready");
//!         Ok(())
//!     }
//! }
//!
//! let decoder = ActiveObject::new("decode", PRIORITY_NOMINAL, Decode);
//! decoder.add_to_scheduler()?;
//! decoder.run_if_not_ready()?;
//! ```

use crate::error::{Result, SchedError};
use crate::order::QueueId;
use crate::status::{CompletionHint, RequestStatus};
use crate::thread_context::ThreadContext;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

pub const PRIORITY_IDLE: i32 = -100;
pub const PRIORITY_LOW: i32 = -20;
pub const PRIORITY_NOMINAL: i32 = 0;
pub const PRIORITY_HIGH: i32 = 10;
pub const PRIORITY_HIGHEST: i32 = 20;

/// Result of a handler callback. The error is an application error code.
pub type RunResult = std::result::Result<(), i32>;

/// Behaviour plugged into an [`ActiveObject`].
///
/// Handlers take `&self`; keep mutable state behind a lock or atomics.
pub trait ActiveHandler: Send + Sync {
    /// Called on the scheduler thread once the request has completed. The
    /// busy flag is already cleared, so the handler may re-arm.
    fn run(&self, active: &Arc<ActiveObject>) -> RunResult;

    /// Called when `run` fails. Return `Ok` to swallow the error.
    fn run_error(&self, _active: &Arc<ActiveObject>, code: i32) -> RunResult {
        Err(code)
    }

    /// Called by [`ActiveObject::cancel`] to abort an outstanding request.
    ///
    /// The request must end up completed, here or by whoever else owns it,
    /// or cancellation will block.
    fn do_cancel(&self, active: &Arc<ActiveObject>) -> Result<()> {
        if active.status().is_pending() {
            active.pend_complete_in_thread(RequestStatus::CANCEL)?;
        }
        Ok(())
    }
}

/// Per-request bookkeeping. Guarded by the object's request lock.
#[derive(Debug, Default)]
pub(crate) struct Request {
    pub(crate) busy: bool,
    pub(crate) status: RequestStatus,
    pub(crate) queue: Option<QueueId>,
    pub(crate) time_to_run: u32,
    pub(crate) time_queued: u32,
    pub(crate) seq: u32,
    pub(crate) added: u64,
}

/// Dispatch statistics kept per active object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Dispatches of `run`.
    pub runs: u64,
    /// Dispatches whose error was not recovered by `run_error`.
    pub unhandled_errors: u64,
    /// Ticks spent in the ready queue, summed over all dispatches.
    pub total_wait_ticks: u64,
    pub max_wait_ticks: u32,
    /// Wall time spent in `run` and `run_error`.
    pub total_run_time: Duration,
    pub max_run_time: Duration,
}

impl RunStats {
    fn record(&mut self, wait_ticks: u32, run_time: Duration, handled: bool) {
        self.runs += 1;
        if !handled {
            self.unhandled_errors += 1;
        }
        self.total_wait_ticks += u64::from(wait_ticks);
        self.max_wait_ticks = self.max_wait_ticks.max(wait_ticks);
        self.total_run_time += run_time;
        self.max_run_time = self.max_run_time.max(run_time);
    }
}

/// Cooperative unit of work scheduled on one thread.
pub struct ActiveObject {
    name: String,
    priority: i32,
    request: Mutex<Request>,
    stats: Mutex<RunStats>,
    context: ThreadContext,
    handler: Box<dyn ActiveHandler>,
}

impl ActiveObject {
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        handler: impl ActiveHandler + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            priority,
            request: Mutex::new(Request::default()),
            stats: Mutex::new(RunStats::default()),
            context: ThreadContext::new(),
            handler: Box::new(handler),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn status(&self) -> RequestStatus {
        self.request.lock().status
    }

    pub fn set_status(&self, status: RequestStatus) {
        self.request.lock().status = status;
    }

    pub fn is_busy(&self) -> bool {
        self.request.lock().busy
    }

    pub fn is_added(&self) -> bool {
        self.context.is_open()
    }

    pub fn is_in_any_queue(&self) -> bool {
        self.request.lock().queue.is_some()
    }

    /// Tick at which the last queue insertion happened.
    pub fn time_queued(&self) -> u32 {
        self.request.lock().time_queued
    }

    /// Order in which this object joined its scheduler.
    pub fn added_number(&self) -> u64 {
        self.request.lock().added
    }

    /// Snapshot of the dispatch statistics.
    pub fn stats(&self) -> RunStats {
        *self.stats.lock()
    }

    pub fn thread_context(&self) -> &ThreadContext {
        &self.context
    }

    /// Binds the object to the scheduler installed on the calling thread.
    pub fn add_to_scheduler(&self) -> Result<()> {
        self.context.enter()?;
        let scheduler = self.context.scheduler()?;
        self.request.lock().added = scheduler.next_added_number();
        trace!(active_object = %self.name, "added to scheduler");
        Ok(())
    }

    /// Cancels any outstanding request and unbinds from the scheduler.
    pub fn remove_from_scheduler(self: &Arc<Self>) -> Result<()> {
        if self.is_added() && self.is_busy() {
            self.cancel()?;
        }
        self.context.exit();
        trace!(active_object = %self.name, "removed from scheduler");
        Ok(())
    }

    /// Marks a request as outstanding.
    ///
    /// Fails with `InvalidState` if a request is already outstanding or the
    /// object is not added, and with `ThreadContextIncorrect` when called off
    /// the scheduler thread while thread checks are enabled.
    pub fn set_busy(&self) -> Result<()> {
        if self.is_busy() {
            return Err(SchedError::InvalidState);
        }
        if !self.context.is_open() {
            return Err(SchedError::InvalidState);
        }
        self.check_thread()?;

        self.request.lock().busy = true;
        Ok(())
    }

    /// Arms a request that some other party will complete.
    pub fn pend_for_exec(&self) -> Result<()> {
        self.set_busy()?;
        self.set_status(RequestStatus::PENDING);
        Ok(())
    }

    /// Completes the outstanding request. Safe from any thread.
    pub fn pend_complete(self: &Arc<Self>, reason: impl Into<RequestStatus>) -> Result<()> {
        self.context
            .pend_complete(self, reason.into(), CompletionHint::Undetermined)
    }

    /// Completes the outstanding request from the scheduler's own thread.
    pub fn pend_complete_in_thread(self: &Arc<Self>, reason: RequestStatus) -> Result<()> {
        self.context
            .pend_complete(self, reason, CompletionHint::InThread)
    }

    /// Arms and immediately completes a request unless one is outstanding.
    pub fn run_if_not_ready(self: &Arc<Self>) -> Result<()> {
        if !self.is_busy() {
            self.pend_for_exec()?;
            self.pend_complete(RequestStatus::NONE)?;
        }
        Ok(())
    }

    /// Arms a timer request that completes after `delay_us` microseconds.
    pub fn after(self: &Arc<Self>, delay_us: u32) -> Result<()> {
        self.set_busy()?;
        self.set_status(RequestStatus::PENDING);
        let scheduler = self.context.scheduler()?;
        scheduler.add_to_exec_timer_q(self, delay_us)
    }

    /// Timer form of [`run_if_not_ready`](Self::run_if_not_ready).
    pub fn run_if_not_ready_after(self: &Arc<Self>, delay_us: u32) -> Result<()> {
        if self.is_busy() {
            return Ok(());
        }
        if delay_us > 0 {
            return self.after(delay_us);
        }

        self.set_busy()?;
        self.set_status(RequestStatus::PENDING);
        if self.is_added() {
            self.pend_complete_in_thread(RequestStatus::NONE)?;
        }
        Ok(())
    }

    /// Cancels the outstanding request, if any.
    ///
    /// Runs the handler's `do_cancel`, then waits for the request to complete
    /// and discards it so `run` is not called.
    pub fn cancel(self: &Arc<Self>) -> Result<()> {
        if !self.is_busy() {
            return Ok(());
        }
        self.check_thread()?;

        trace!(active_object = %self.name, "canceling request");
        self.handler.do_cancel(self)?;
        let scheduler = self.context.scheduler()?;
        scheduler.request_canceled(self)
    }

    pub(crate) fn request(&self) -> MutexGuard<'_, Request> {
        self.request.lock()
    }

    pub(crate) fn clear_busy(&self) {
        self.request.lock().busy = false;
    }

    pub(crate) fn run(self: &Arc<Self>) -> RunResult {
        self.handler.run(self)
    }

    pub(crate) fn run_error(self: &Arc<Self>, code: i32) -> RunResult {
        self.handler.run_error(self, code)
    }

    pub(crate) fn record_run(&self, wait_ticks: u32, run_time: Duration, handled: bool) {
        self.stats.lock().record(wait_ticks, run_time, handled);
    }

    fn check_thread(&self) -> Result<()> {
        let scheduler = self.context.scheduler()?;
        if scheduler.thread_checks() {
            ThreadContext::leave_if_wrong_thread(&self.context)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ActiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request = self.request.lock();
        f.debug_struct("ActiveObject")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("busy", &request.busy)
            .field("status", &request.status)
            .field("queued", &request.queue.is_some())
            .finish()
    }
}
