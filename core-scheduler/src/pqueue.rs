//! Binary heap with a pluggable ordering and arbitrary-position removal.
//!
//! The ready and timer queues both need "pop the most urgent entry" plus
//! "remove this particular entry wherever it sits", which `BinaryHeap` does
//! not offer. [`PriorityQueue`] is a plain `Vec`-backed max-heap whose
//! ordering comes from a [`HeapOrder`] value, so a queue can carry runtime
//! policy (such as the equal-priority tie-break) in its comparator.
//!
//! # Complexity
//!
//! | Operation  | Time     |
//! |------------|----------|
//! | push       | O(log n) |
//! | pop        | O(log n) |
//! | remove_by  | O(n)     |
//! | peek       | O(1)     |

/// Ordering used by a [`PriorityQueue`].
pub trait HeapOrder<T> {
    /// Returns true if `a` must leave the queue before `b`.
    fn precedes(&self, a: &T, b: &T) -> bool;
}

/// `Vec`-backed binary max-heap.
///
/// # Invariants
///
/// For every entry at position `i` with parent `p = (i - 1) / 2`,
/// `order.precedes(heap[i], heap[p])` is false.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T, O> {
    heap: Vec<T>,
    order: O,
}

impl<T, O: HeapOrder<T>> PriorityQueue<T, O> {
    pub fn new(order: O) -> Self {
        Self {
            heap: Vec::new(),
            order,
        }
    }

    /// Creates a queue with room for `capacity` entries before reallocating.
    pub fn with_capacity(order: O, capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            order,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the entry that would be popped next.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    pub fn order(&self) -> &O {
        &self.order
    }

    pub fn push(&mut self, item: T) {
        self.heap.push(item);
        let pos = self.heap.len() - 1;
        self.sift_up(pos);
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Position of the first entry matching `pred`, in heap order.
    pub fn position<P>(&self, pred: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.heap.iter().position(pred)
    }

    /// Removes the first entry matching `pred`.
    pub fn remove_by<P>(&mut self, pred: P) -> Option<T>
    where
        P: FnMut(&T) -> bool,
    {
        let pos = self.position(pred)?;
        Some(self.remove_at(pos))
    }

    /// Iterates entries in heap (not priority) order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.heap.iter()
    }

    /// Removes every entry, returning them in heap order.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.heap)
    }

    fn remove_at(&mut self, pos: usize) -> T {
        let last = self.heap.len() - 1;
        self.heap.swap(pos, last);
        let removed = self.heap.swap_remove(last);

        if pos < self.heap.len() {
            // The moved entry may belong above or below its new slot
            let new_pos = self.sift_up(pos);
            if new_pos == pos {
                self.sift_down(pos);
            }
        }
        removed
    }

    fn sift_up(&mut self, mut pos: usize) -> usize {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.order.precedes(&self.heap[pos], &self.heap[parent]) {
                self.heap.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
        pos
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            let mut first = pos;

            if left < len && self.order.precedes(&self.heap[left], &self.heap[first]) {
                first = left;
            }
            if right < len && self.order.precedes(&self.heap[right], &self.heap[first]) {
                first = right;
            }

            if first == pos {
                break;
            }

            self.heap.swap(pos, first);
            pos = first;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Largest;

    impl HeapOrder<i32> for Largest {
        fn precedes(&self, a: &i32, b: &i32) -> bool {
            a > b
        }
    }

    fn drain_sorted(queue: &mut PriorityQueue<i32, Largest>) -> Vec<i32> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn test_pop_order() {
        let mut queue = PriorityQueue::with_capacity(Largest, 8);
        for value in [5, 1, 9, 3, 7, 2, 8] {
            queue.push(value);
        }

        assert_eq!(queue.len(), 7);
        assert_eq!(queue.peek(), Some(&9));
        assert_eq!(drain_sorted(&mut queue), vec![9, 8, 7, 5, 3, 2, 1]);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_remove_by_keeps_heap_valid() {
        let mut queue = PriorityQueue::new(Largest);
        for value in [10, 4, 9, 1, 3, 8, 7, 2] {
            queue.push(value);
        }

        assert_eq!(queue.remove_by(|v| *v == 4), Some(4));
        assert_eq!(queue.remove_by(|v| *v == 10), Some(10));
        assert_eq!(queue.remove_by(|v| *v == 42), None);

        assert_eq!(drain_sorted(&mut queue), vec![9, 8, 7, 3, 2, 1]);
    }

    #[test]
    fn test_remove_last_slot() {
        let mut queue = PriorityQueue::new(Largest);
        queue.push(2);
        queue.push(1);

        assert_eq!(queue.remove_by(|v| *v == 1), Some(1));
        assert_eq!(queue.peek(), Some(&2));
    }

    #[test]
    fn test_drain() {
        let mut queue = PriorityQueue::new(Largest);
        queue.push(1);
        queue.push(2);

        let mut drained = queue.drain();
        drained.sort();
        assert_eq!(drained, vec![1, 2]);
        assert!(queue.is_empty());
    }
}
