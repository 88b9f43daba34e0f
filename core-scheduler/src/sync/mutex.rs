//! Lifecycle-checked mutex and an always-available thread lock.

use crate::error::ProcError;
use parking_lot::MutexGuard;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutex that must be created before it can be locked.
///
/// Mirrors the semaphore's lifecycle: `lock` on a mutex that was never
/// created, or has been closed, fails with [`ProcError::InvalidOperation`].
#[derive(Debug, Default)]
pub struct Mutex<T> {
    created: AtomicBool,
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Returns a closed mutex guarding `value`.
    pub fn new(value: T) -> Self {
        Self {
            created: AtomicBool::new(false),
            inner: parking_lot::Mutex::new(value),
        }
    }

    pub fn create(&self) -> Result<(), ProcError> {
        self.created
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ProcError::InvalidOperation)
    }

    pub fn close(&self) -> Result<(), ProcError> {
        self.created
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ProcError::InvalidOperation)
    }

    /// Blocks until the lock is acquired.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, ProcError> {
        if !self.is_created() {
            return Err(ProcError::InvalidOperation);
        }
        Ok(self.inner.lock())
    }

    /// Acquires the lock only if it is free.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, ProcError> {
        if !self.is_created() {
            return Err(ProcError::InvalidOperation);
        }
        self.inner.try_lock().ok_or(ProcError::MutexLocked)
    }

    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }
}

/// Lock that exists for its whole lifetime and cannot fail.
///
/// Used for internal critical sections such as the ready queue, where a
/// lifecycle check would only add an unreachable error path.
#[derive(Debug, Default)]
pub struct ThreadLock<T> {
    inner: parking_lot::Mutex<T>,
}

impl<T> ThreadLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: parking_lot::Mutex::new(value),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock()
    }
}
