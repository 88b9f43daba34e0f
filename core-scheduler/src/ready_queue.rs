//! # Ready Queue
//!
//! Priority queue of completed requests waiting to run, shared between the
//! scheduler thread and any thread that completes requests.
//!
//! ## Invariants
//!
//! - All heap mutation happens under the queue lock.
//! - Outside the lock, the semaphore count equals the number of queued
//!   entries. `pend_complete` signals inside the same critical section as the
//!   push; `pop_top` and `remove` consume a signal inside the critical section
//!   that takes the entry out.
//! - A request is a member of at most one queue, tracked by the membership
//!   marker in the request.
//!
//! ## Waiting
//!
//! `wait_and_pop_top` blocks on the semaphore first and only then takes the
//! lock, so a successful wait guarantees an entry is available. Waiting never
//! holds the lock.

use crate::active::ActiveObject;
use crate::error::{ProcError, Result, SchedError};
use crate::observer::SchedulerObserver;
use crate::order::{QueueEntry, QueueId, ReadyOrder, RequestKey};
use crate::pqueue::PriorityQueue;
use crate::status::RequestStatus;
use crate::sync::{Semaphore, ThreadLock};
use bridge_traits::time::TickSource;
use core_runtime::config::TieBreak;
use std::sync::Arc;
use tracing::error;

struct ReadyState {
    heap: PriorityQueue<QueueEntry, ReadyOrder>,
    seq: u32,
    observer: Option<Arc<dyn SchedulerObserver>>,
}

/// Lock-guarded, semaphore-gated priority queue of ready requests.
pub struct ReadyQueue {
    id: QueueId,
    state: ThreadLock<ReadyState>,
    sem: Semaphore,
    ticks: Arc<dyn TickSource>,
}

impl ReadyQueue {
    /// Creates an empty queue with room for `reserve` entries.
    ///
    /// The semaphore is created by [`thread_logon`](Self::thread_logon).
    pub fn new(reserve: usize, tie_break: TieBreak, ticks: Arc<dyn TickSource>) -> Self {
        Self {
            id: QueueId::next(),
            state: ThreadLock::new(ReadyState {
                heap: PriorityQueue::with_capacity(ReadyOrder::new(tie_break), reserve),
                seq: 0,
                observer: None,
            }),
            sem: Semaphore::new(),
            ticks,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn thread_logon(&self) -> Result<()> {
        self.sem.create(0).map_err(SchedError::from)
    }

    pub fn thread_logoff(&self) -> Result<()> {
        self.sem.close().map_err(SchedError::from)
    }

    /// Queues a completed request and wakes the scheduler.
    ///
    /// The request must be busy with status `PENDING` and not already in any
    /// queue. On success its status becomes `reason` and any registered
    /// observer is notified once. A `PENDING` reason is rejected with
    /// `InvalidState` and leaves the queue untouched.
    pub fn pend_complete(&self, active: &Arc<ActiveObject>, reason: RequestStatus) -> Result<()> {
        if reason.is_pending() {
            return Err(SchedError::InvalidState);
        }
        let mut state = self.state.lock();
        let mut request = active.request();

        if request.queue.is_some() {
            return Err(SchedError::InvalidState);
        }
        if !request.busy || !request.status.is_pending() {
            return Err(SchedError::Corrupt);
        }

        state.seq = state.seq.wrapping_add(1);
        request.queue = Some(self.id);
        request.time_queued = self.ticks.tick_count();
        request.seq = state.seq;

        let key = RequestKey {
            priority: active.priority(),
            seq: request.seq,
            added: request.added,
            time_to_run: request.time_to_run,
        };
        state.heap.push(QueueEntry {
            key,
            active: Arc::clone(active),
        });

        if self.sem.signal().is_err() {
            // Keep count == size: take the entry back out
            state.heap.remove_by(|entry| entry.is(active));
            request.queue = None;
            return Err(SchedError::SystemCallFailed);
        }

        request.status = reason;
        drop(request);

        if let Some(observer) = state.observer.take() {
            observer.on_ready();
        }
        Ok(())
    }

    /// Blocks until a request is ready, then pops it.
    pub fn wait_and_pop_top(&self) -> Result<Arc<ActiveObject>> {
        self.sem.wait().map_err(wait_error)?;
        self.pop_after_wait()
    }

    /// Like [`wait_and_pop_top`](Self::wait_and_pop_top), but returns `None`
    /// after `timeout_ms` with the queue unchanged.
    pub fn wait_and_pop_top_timeout(&self, timeout_ms: u32) -> Result<Option<Arc<ActiveObject>>> {
        match self.sem.wait_timeout(timeout_ms) {
            Ok(()) => self.pop_after_wait().map(Some),
            Err(ProcError::Timeout) => Ok(None),
            Err(err) => Err(wait_error(err)),
        }
    }

    /// Pops the top request without blocking.
    pub fn pop_top(&self) -> Result<Option<Arc<ActiveObject>>> {
        let mut state = self.state.lock();
        let Some(entry) = state.heap.pop() else {
            return Ok(None);
        };
        entry.active.request().queue = None;

        match self.sem.try_wait() {
            Ok(()) => Ok(Some(entry.active)),
            Err(ProcError::NotSignaled) => {
                error!(
                    active_object = %entry.active.name(),
                    "ready queue count out of sync with its semaphore"
                );
                debug_assert!(false, "ready queue semaphore not signaled");
                Err(SchedError::Corrupt)
            }
            Err(err) => Err(wait_error(err)),
        }
    }

    /// Highest-priority ready request, left in place.
    pub fn top(&self) -> Option<Arc<ActiveObject>> {
        self.state
            .lock()
            .heap
            .peek()
            .map(|entry| Arc::clone(&entry.active))
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    pub fn semaphore_count(&self) -> u32 {
        self.sem.count()
    }

    pub fn contains(&self, active: &ActiveObject) -> bool {
        let _state = self.state.lock();
        active.request().queue == Some(self.id)
    }

    /// Removes `active` if queued, consuming its semaphore signal.
    ///
    /// Returns whether the request was found. Removing an absent request is a
    /// no-op.
    pub fn remove(&self, active: &Arc<ActiveObject>) -> Result<bool> {
        let mut state = self.state.lock();
        if state.heap.remove_by(|entry| entry.is(active)).is_none() {
            return Ok(false);
        }
        active.request().queue = None;

        match self.sem.try_wait() {
            Ok(()) => Ok(true),
            Err(ProcError::NotSignaled) => {
                error!(
                    active_object = %active.name(),
                    "ready queue count out of sync on remove"
                );
                debug_assert!(false, "ready queue semaphore not signaled on remove");
                Err(SchedError::Corrupt)
            }
            Err(err) => Err(wait_error(err)),
        }
    }

    /// Blocks until `target` has been completed into this queue.
    ///
    /// Every signal consumed while waiting is given back afterwards, so the
    /// semaphore count is unchanged on return.
    pub fn wait_for_request_complete(&self, target: &Arc<ActiveObject>) -> Result<()> {
        let mut consumed: u32 = 0;
        let mut outcome = Ok(());

        loop {
            if let Err(err) = self.sem.wait() {
                outcome = Err(wait_error(err));
                break;
            }
            consumed += 1;
            if self.contains(target) {
                break;
            }
        }

        for _ in 0..consumed {
            if self.sem.signal().is_err() {
                return Err(SchedError::SystemCallFailed);
            }
        }
        outcome
    }

    /// Registers a one-shot observer.
    ///
    /// If requests are already queued the observer is notified immediately
    /// and not stored. `None` clears any registration.
    pub fn register_for_callback(&self, observer: Option<Arc<dyn SchedulerObserver>>) {
        let mut state = self.state.lock();
        match observer {
            Some(observer) if !state.heap.is_empty() => {
                state.observer = None;
                observer.on_ready();
            }
            observer => state.observer = observer,
        }
    }

    pub fn has_callback(&self) -> bool {
        self.state.lock().observer.is_some()
    }

    /// Tells the observer the earliest timer changed. The observer is
    /// consumed and called outside the lock.
    pub fn timer_callback(&self, delay_us: u32) {
        let observer = self.state.lock().observer.take();
        if let Some(observer) = observer {
            observer.on_timer(delay_us / 1000);
        }
    }

    fn pop_after_wait(&self) -> Result<Arc<ActiveObject>> {
        let mut state = self.state.lock();
        match state.heap.pop() {
            Some(entry) => {
                entry.active.request().queue = None;
                Ok(entry.active)
            }
            None => {
                error!("ready queue empty after semaphore wait");
                debug_assert!(false, "ready queue empty after semaphore wait");
                Err(SchedError::Corrupt)
            }
        }
    }
}

/// Waiting on a semaphore outside `thread_logon`/`thread_logoff` is misuse,
/// not a system failure.
fn wait_error(err: ProcError) -> SchedError {
    match err {
        ProcError::InvalidOperation => SchedError::InvalidState,
        _ => SchedError::SystemCallFailed,
    }
}

impl std::fmt::Debug for ReadyQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyQueue")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("semaphore_count", &self.semaphore_count())
            .finish()
    }
}
