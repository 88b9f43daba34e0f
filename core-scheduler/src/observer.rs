//! Notifications for hosts that drive the scheduler from their own loop.
//!
//! A host running [`Scheduler::run_scheduler_non_blocking`] registers an
//! observer to learn when work becomes ready or when the earliest timer
//! changes, so it can schedule the next non-blocking run. Registrations are
//! one-shot: the slot is cleared after each notification.
//!
//! [`Scheduler::run_scheduler_non_blocking`]: crate::Scheduler::run_scheduler_non_blocking

/// Receives one-shot scheduler notifications.
///
/// `on_ready` is called while the ready queue lock is held; implementations
/// must not call back into the queue or the scheduler from it.
pub trait SchedulerObserver: Send + Sync {
    /// A request completed and the ready queue is non-empty.
    fn on_ready(&self);

    /// The earliest pending timer changed and is due in `delay_ms`.
    fn on_timer(&self, delay_ms: u32);
}
