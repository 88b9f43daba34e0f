//! Thread-local registry of the scheduler installed on each OS thread.

use crate::scheduler::Scheduler;
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<Scheduler>>> = const { RefCell::new(None) };
}

/// Scheduler installed on the calling thread.
pub fn current() -> Option<Arc<Scheduler>> {
    CURRENT.with(|slot| slot.borrow().clone())
}

pub fn is_installed() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

/// Replaces the calling thread's scheduler, returning the previous one.
pub(crate) fn set(scheduler: Option<Arc<Scheduler>>) -> Option<Arc<Scheduler>> {
    CURRENT.with(|slot| slot.replace(scheduler))
}

/// True if `scheduler` is the one installed on the calling thread.
pub(crate) fn is_current(scheduler: &Scheduler) -> bool {
    CURRENT.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), scheduler))
    })
}
