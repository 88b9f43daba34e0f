//! Timer queue: pending timer requests ordered by deadline.
//!
//! Only the scheduler thread touches the timer queue, so it has no lock or
//! semaphore of its own.

use crate::active::ActiveObject;
use crate::error::{Result, SchedError};
use crate::order::{QueueEntry, QueueId, RequestKey, TimerOrder};
use crate::pqueue::PriorityQueue;
use bridge_traits::time::TickSource;
use core_runtime::config::TieBreak;
use std::sync::Arc;

pub struct TimerQueue {
    id: QueueId,
    heap: PriorityQueue<QueueEntry, TimerOrder>,
    seq: u32,
    ticks: Arc<dyn TickSource>,
}

impl TimerQueue {
    pub fn new(reserve: usize, tie_break: TieBreak, ticks: Arc<dyn TickSource>) -> Self {
        Self {
            id: QueueId::next(),
            heap: PriorityQueue::with_capacity(TimerOrder::new(tie_break), reserve),
            seq: 0,
            ticks,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Queues `active` by its current time-to-run.
    pub fn add(&mut self, active: &Arc<ActiveObject>) -> Result<()> {
        let mut request = active.request();
        if request.queue.is_some() {
            return Err(SchedError::InvalidState);
        }

        self.seq = self.seq.wrapping_add(1);
        request.queue = Some(self.id);
        request.time_queued = self.ticks.tick_count();
        request.seq = self.seq;

        let key = RequestKey {
            priority: active.priority(),
            seq: request.seq,
            added: request.added,
            time_to_run: request.time_to_run,
        };
        self.heap.push(QueueEntry {
            key,
            active: Arc::clone(active),
        });
        Ok(())
    }

    /// Earliest timer and its deadline tick.
    pub fn top(&self) -> Option<(&Arc<ActiveObject>, u32)> {
        self.heap
            .peek()
            .map(|entry| (&entry.active, entry.key.time_to_run))
    }

    pub fn pop_top(&mut self) -> Option<Arc<ActiveObject>> {
        let entry = self.heap.pop()?;
        entry.active.request().queue = None;
        Some(entry.active)
    }

    /// Pops the top entry, which must be `active`.
    pub fn pop(&mut self, active: &Arc<ActiveObject>) -> Result<()> {
        if !self.heap.peek().is_some_and(|entry| entry.is(active)) {
            return Err(SchedError::Corrupt);
        }
        self.pop_top();
        Ok(())
    }

    /// Removes `active` wherever it sits. Returns whether it was queued.
    pub fn remove(&mut self, active: &Arc<ActiveObject>) -> bool {
        match self.heap.remove_by(|entry| entry.is(active)) {
            Some(entry) => {
                entry.active.request().queue = None;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, active: &ActiveObject) -> bool {
        active.request().queue == Some(self.id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("id", &self.id)
            .field("len", &self.heap.len())
            .finish()
    }
}
