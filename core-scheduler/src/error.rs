//! Error types for the scheduler core.
//!
//! Primitives (semaphores and mutexes) report [`ProcError`]; queue, thread
//! context and scheduler operations report [`SchedError`].

use thiserror::Error;

/// Outcome of a failed primitive operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcError {
    #[error("Operation not valid in the primitive's current state")]
    InvalidOperation,

    #[error("Underlying system call failed")]
    SystemCallFailed,

    #[error("Timed out waiting for signal")]
    Timeout,

    #[error("Semaphore not signaled")]
    NotSignaled,

    #[error("Mutex already locked")]
    MutexLocked,
}

/// Scheduler, queue and thread-context errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    #[error("Invalid state")]
    InvalidState,

    #[error("Scheduler state corrupt")]
    Corrupt,

    #[error("System call failed")]
    SystemCallFailed,

    #[error("No scheduler installed on this thread")]
    NotInstalled,

    #[error("A scheduler is already installed on this thread")]
    AlreadyInstalled,

    #[error("Called from the wrong thread context")]
    ThreadContextIncorrect,

    #[error("Scheduler not ready")]
    NotReady,

    #[error("Operation not supported")]
    NotSupported,

    #[error("Active object error {0} not handled")]
    Unhandled(i32),

    #[error("Primitive error: {0}")]
    Proc(#[from] ProcError),
}

impl SchedError {
    /// Returns true for errors that leave the scheduler unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedError::Corrupt
                | SchedError::SystemCallFailed
                | SchedError::Proc(ProcError::SystemCallFailed)
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proc_error_converts() {
        let err: SchedError = ProcError::Timeout.into();
        assert_eq!(err, SchedError::Proc(ProcError::Timeout));
        assert!(err.to_string().contains("Timed out"));
    }

    #[test]
    fn test_is_fatal() {
        assert!(SchedError::Corrupt.is_fatal());
        assert!(SchedError::SystemCallFailed.is_fatal());
        assert!(SchedError::Proc(ProcError::SystemCallFailed).is_fatal());
        assert!(!SchedError::InvalidState.is_fatal());
        assert!(!SchedError::Unhandled(-2).is_fatal());
    }
}
