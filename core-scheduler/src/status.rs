//! Request completion codes and caller-context hints.

use std::fmt;

/// Status code carried by an active object's request.
///
/// Values other than the named constants are application-defined completion
/// reasons and pass through the scheduler untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestStatus(i32);

impl RequestStatus {
    /// Successful completion.
    pub const NONE: RequestStatus = RequestStatus(0);
    /// Request was canceled.
    pub const CANCEL: RequestStatus = RequestStatus(-1);
    /// Generic failure.
    pub const GENERAL: RequestStatus = RequestStatus(-2);
    /// Request is outstanding. Never a valid completion reason.
    pub const PENDING: RequestStatus = RequestStatus(0x7fff_ffff);

    pub const fn new(code: i32) -> Self {
        RequestStatus(code)
    }

    pub const fn code(self) -> i32 {
        self.0
    }

    pub fn is_pending(self) -> bool {
        self == RequestStatus::PENDING
    }
}

impl Default for RequestStatus {
    fn default() -> Self {
        RequestStatus::NONE
    }
}

impl From<i32> for RequestStatus {
    fn from(code: i32) -> Self {
        RequestStatus(code)
    }
}

impl From<RequestStatus> for i32 {
    fn from(status: RequestStatus) -> Self {
        status.0
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RequestStatus::NONE => write!(f, "none"),
            RequestStatus::CANCEL => write!(f, "cancel"),
            RequestStatus::GENERAL => write!(f, "general"),
            RequestStatus::PENDING => write!(f, "pending"),
            RequestStatus(code) => write!(f, "{}", code),
        }
    }
}

/// Where a completion call is known to originate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionHint {
    /// Caller is on the scheduler's own thread.
    InThread,
    /// Caller is on some other thread.
    NonThread,
    /// Caller did not say; the thread context decides.
    Undetermined,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RequestStatus::NONE.code(), 0);
        assert_eq!(RequestStatus::CANCEL.code(), -1);
        assert_eq!(RequestStatus::GENERAL.code(), -2);
        assert_eq!(RequestStatus::PENDING.code(), 0x7fff_ffff);
        assert!(RequestStatus::PENDING.is_pending());
        assert!(!RequestStatus::new(42).is_pending());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RequestStatus::CANCEL.to_string(), "cancel");
        assert_eq!(RequestStatus::from(17).to_string(), "17");
        assert_eq!(i32::from(RequestStatus::GENERAL), -2);
    }
}
