//! Thread synchronization primitives.

pub mod mutex;
pub mod semaphore;

pub use mutex::{Mutex, ThreadLock};
pub use semaphore::Semaphore;
