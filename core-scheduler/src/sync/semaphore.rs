//! Counting semaphore with blocking, bounded and non-blocking waits.
//!
//! The semaphore has an explicit lifecycle: it must be created before use and
//! every operation on a closed semaphore fails with
//! [`ProcError::InvalidOperation`]. Closing wakes all waiters so they can
//! observe the closed state.

use crate::error::ProcError;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SemState {
    created: bool,
    count: u32,
}

/// Counting semaphore built on a mutex and condition variable.
#[derive(Debug, Default)]
pub struct Semaphore {
    state: Mutex<SemState>,
    cond: Condvar,
}

impl Semaphore {
    /// Returns a semaphore in the closed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the semaphore with `initial` signals.
    pub fn create(&self, initial: u32) -> Result<(), ProcError> {
        let mut state = self.state.lock();
        if state.created {
            return Err(ProcError::InvalidOperation);
        }
        state.created = true;
        state.count = initial;
        Ok(())
    }

    /// Closes the semaphore, waking every waiter.
    pub fn close(&self) -> Result<(), ProcError> {
        let mut state = self.state.lock();
        if !state.created {
            return Err(ProcError::InvalidOperation);
        }
        state.created = false;
        state.count = 0;
        self.cond.notify_all();
        Ok(())
    }

    /// Blocks until the count is positive, then decrements it.
    pub fn wait(&self) -> Result<(), ProcError> {
        let mut state = self.state.lock();
        if !state.created {
            return Err(ProcError::InvalidOperation);
        }

        while state.count == 0 {
            self.cond.wait(&mut state);
            if !state.created {
                return Err(ProcError::InvalidOperation);
            }
        }

        state.count -= 1;
        Ok(())
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout_ms`.
    ///
    /// The deadline is fixed on entry, so spurious wakeups never extend the
    /// total wait. On expiry the count is left untouched.
    pub fn wait_timeout(&self, timeout_ms: u32) -> Result<(), ProcError> {
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));

        let mut state = self.state.lock();
        if !state.created {
            return Err(ProcError::InvalidOperation);
        }

        while state.count == 0 {
            let timed_out = self.cond.wait_until(&mut state, deadline).timed_out();
            if !state.created {
                return Err(ProcError::InvalidOperation);
            }
            if timed_out && state.count == 0 {
                return Err(ProcError::Timeout);
            }
        }

        state.count -= 1;
        Ok(())
    }

    /// Decrements the count if it is positive, without blocking.
    pub fn try_wait(&self) -> Result<(), ProcError> {
        let mut state = self.state.lock();
        if !state.created {
            return Err(ProcError::InvalidOperation);
        }
        if state.count == 0 {
            return Err(ProcError::NotSignaled);
        }
        state.count -= 1;
        Ok(())
    }

    /// Increments the count and wakes one waiter.
    pub fn signal(&self) -> Result<(), ProcError> {
        let mut state = self.state.lock();
        if !state.created {
            return Err(ProcError::InvalidOperation);
        }
        state.count = state
            .count
            .checked_add(1)
            .ok_or(ProcError::SystemCallFailed)?;
        self.cond.notify_one();
        Ok(())
    }

    /// Current count. Zero when closed.
    pub fn count(&self) -> u32 {
        self.state.lock().count
    }

    pub fn is_created(&self) -> bool {
        self.state.lock().created
    }
}
