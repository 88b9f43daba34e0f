//! Per-thread identity and scheduler binding.
//!
//! Every active object (and every scheduler) carries a [`ThreadContext`]
//! recording which OS thread it belongs to and which scheduler that thread
//! runs. Completions route through the context so that same-thread callers
//! take the in-thread path and foreign threads take the cross-thread path.

use crate::active::ActiveObject;
use crate::error::{Result, SchedError};
use crate::registry;
use crate::scheduler::Scheduler;
use crate::status::{CompletionHint, RequestStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

struct Binding {
    thread_id: u64,
    scheduler: Weak<Scheduler>,
}

/// Thread binding of a scheduler or active object.
#[derive(Default)]
pub struct ThreadContext {
    binding: Mutex<Option<Binding>>,
}

impl ThreadContext {
    /// Returns a closed context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric id of the calling thread, stable for the thread's lifetime.
    pub fn id() -> u64 {
        THREAD_ID.with(|id| *id)
    }

    /// True if the calling thread has a scheduler installed.
    pub fn thread_has_scheduler() -> bool {
        registry::is_installed()
    }

    /// Binds this context to the calling thread and its scheduler.
    pub fn enter(&self) -> Result<()> {
        let scheduler = registry::current().ok_or(SchedError::NotInstalled)?;
        *self.binding.lock() = Some(Binding {
            thread_id: Self::id(),
            scheduler: Arc::downgrade(&scheduler),
        });
        Ok(())
    }

    pub fn exit(&self) {
        *self.binding.lock() = None;
    }

    pub fn is_open(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Thread the context was entered on, if open.
    pub fn thread_id(&self) -> Option<u64> {
        self.binding.lock().as_ref().map(|b| b.thread_id)
    }

    /// True if open and the caller is on the bound thread.
    pub fn is_same_thread_context(&self) -> bool {
        self.thread_id() == Some(Self::id())
    }

    /// Fails with `ThreadContextIncorrect` unless called on `context`'s thread.
    pub fn leave_if_wrong_thread(context: &ThreadContext) -> Result<()> {
        if context.is_same_thread_context() {
            Ok(())
        } else {
            Err(SchedError::ThreadContextIncorrect)
        }
    }

    /// The bound scheduler.
    pub fn scheduler(&self) -> Result<Arc<Scheduler>> {
        self.binding
            .lock()
            .as_ref()
            .and_then(|b| b.scheduler.upgrade())
            .ok_or(SchedError::NotInstalled)
    }

    /// Completes `active`'s request through the bound scheduler.
    ///
    /// An `Undetermined` hint becomes `InThread` for same-thread callers and
    /// `NonThread` otherwise.
    pub fn pend_complete(
        &self,
        active: &Arc<ActiveObject>,
        reason: RequestStatus,
        hint: CompletionHint,
    ) -> Result<()> {
        if !self.is_open() || reason.is_pending() {
            return Err(SchedError::InvalidState);
        }

        let hint = match hint {
            CompletionHint::Undetermined if self.is_same_thread_context() => {
                CompletionHint::InThread
            }
            CompletionHint::Undetermined => CompletionHint::NonThread,
            other => other,
        };

        self.scheduler()?.pend_complete(active, reason, hint)
    }
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("thread_id", &self.thread_id())
            .finish()
    }
}
