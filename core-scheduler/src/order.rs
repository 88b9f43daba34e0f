//! Queue entries and the orderings the ready and timer queues use.

use crate::active::ActiveObject;
use crate::pqueue::HeapOrder;
use core_runtime::config::TieBreak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Largest forward distance, in ticks, still treated as "not yet due".
///
/// Tick counters wrap at 32 bits, so two tick values are compared by the
/// wrapped difference: anything within half the range counts as later.
pub const TIME_COMPARE_THRESHOLD: u32 = 0x7fff_ffff;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one ready or timer queue, stored as a request's membership
/// marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(u64);

impl QueueId {
    pub(crate) fn next() -> Self {
        QueueId(NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Sort key captured when a request is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestKey {
    pub priority: i32,
    pub seq: u32,
    pub added: u64,
    pub time_to_run: u32,
}

/// One queued request.
#[derive(Clone)]
pub(crate) struct QueueEntry {
    pub(crate) key: RequestKey,
    pub(crate) active: Arc<ActiveObject>,
}

impl QueueEntry {
    pub(crate) fn is(&self, active: &Arc<ActiveObject>) -> bool {
        Arc::ptr_eq(&self.active, active)
    }
}

/// Priority first, then the configured tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyOrder {
    pub tie_break: TieBreak,
}

impl ReadyOrder {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// True if `a` runs before `b`.
    pub fn runs_before(&self, a: &RequestKey, b: &RequestKey) -> bool {
        if a.priority != b.priority {
            return a.priority > b.priority;
        }
        match self.tie_break {
            TieBreak::Fifo => a.seq < b.seq,
            TieBreak::AddedOrder => a.added < b.added,
        }
    }
}

impl HeapOrder<QueueEntry> for ReadyOrder {
    fn precedes(&self, a: &QueueEntry, b: &QueueEntry) -> bool {
        self.runs_before(&a.key, &b.key)
    }
}

/// Earliest deadline first, rollover-safe, then the ready ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerOrder {
    pub ready: ReadyOrder,
}

impl TimerOrder {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            ready: ReadyOrder::new(tie_break),
        }
    }

    /// True if `a` fires before `b`.
    pub fn fires_before(&self, a: &RequestKey, b: &RequestKey) -> bool {
        if a.time_to_run != b.time_to_run {
            return is_later(b.time_to_run, a.time_to_run);
        }
        self.ready.runs_before(a, b)
    }
}

impl HeapOrder<QueueEntry> for TimerOrder {
    fn precedes(&self, a: &QueueEntry, b: &QueueEntry) -> bool {
        self.fires_before(&a.key, &b.key)
    }
}

/// True if tick `a` is strictly later than tick `b`, across rollover.
pub fn is_later(a: u32, b: u32) -> bool {
    a != b && a.wrapping_sub(b) <= TIME_COMPARE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(priority: i32, seq: u32, added: u64, time_to_run: u32) -> RequestKey {
        RequestKey {
            priority,
            seq,
            added,
            time_to_run,
        }
    }

    #[test]
    fn test_ready_priority_wins() {
        let order = ReadyOrder::new(TieBreak::Fifo);
        let low = key(5, 1, 1, 0);
        let high = key(10, 2, 2, 0);

        assert!(order.runs_before(&high, &low));
        assert!(!order.runs_before(&low, &high));
    }

    #[test]
    fn test_ready_fifo_tie_break() {
        let order = ReadyOrder::new(TieBreak::Fifo);
        let first = key(5, 1, 9, 0);
        let second = key(5, 2, 3, 0);

        assert!(order.runs_before(&first, &second));
        assert!(!order.runs_before(&second, &first));
    }

    #[test]
    fn test_ready_added_order_tie_break() {
        let order = ReadyOrder::new(TieBreak::AddedOrder);
        let queued_first = key(5, 1, 9, 0);
        let added_first = key(5, 2, 3, 0);

        assert!(order.runs_before(&added_first, &queued_first));
    }

    #[test]
    fn test_is_later_across_rollover() {
        assert!(is_later(10, 5));
        assert!(!is_later(5, 10));
        assert!(!is_later(7, 7));

        // 2 ticks after wrap is later than 2 ticks before it
        assert!(is_later(1, u32::MAX - 1));
        assert!(!is_later(u32::MAX - 1, 1));
    }

    #[test]
    fn test_timer_rollover_ordering() {
        let order = TimerOrder::new(TieBreak::Fifo);
        let before_wrap = key(0, 2, 0, 0xFFFF_FFF0);
        let after_wrap = key(10, 1, 0, 0x0000_0010);

        // Deadline beats priority
        assert!(order.fires_before(&before_wrap, &after_wrap));
        assert!(!order.fires_before(&after_wrap, &before_wrap));
    }

    #[test]
    fn test_timer_equal_deadline_uses_ready_order() {
        let order = TimerOrder::new(TieBreak::Fifo);
        let low = key(1, 1, 0, 100);
        let high = key(2, 2, 0, 100);

        assert!(order.fires_before(&high, &low));
    }
}
