//! Level-bucketed node scheduler used by the event-driven fault propagator
//!
//! Nodes are popped in strictly non-decreasing level order, ties broken by insertion
//! order, and each node carries a "pending" bit so a node queued twice is only
//! processed once.

use std::collections::VecDeque;

/// A level-ordered, dedup-on-insert queue of node indices
pub struct EventQueue {
    /// One FIFO bucket per level; buckets below `min_nonempty` are always empty
    buckets: Vec<VecDeque<usize>>,
    pending: Vec<bool>,
    min_nonempty: usize,
}

impl EventQueue {
    /// A queue sized for `nb_nodes` nodes spanning levels `0..=max_level`
    pub fn new(nb_nodes: usize, max_level: usize) -> EventQueue {
        EventQueue {
            buckets: (0..=max_level).map(|_| VecDeque::new()).collect(),
            pending: vec![false; nb_nodes],
            min_nonempty: max_level + 1,
        }
    }

    /// Queue `node` at `level`, a no-op if it is already pending
    pub fn put(&mut self, node: usize, level: usize) {
        if self.pending[node] {
            return;
        }
        self.pending[node] = true;
        self.buckets[level].push_back(node);
        if level < self.min_nonempty {
            self.min_nonempty = level;
        }
    }

    /// Pop the lowest-level pending node, or `None` if the queue is drained
    pub fn pop(&mut self) -> Option<usize> {
        while self.min_nonempty < self.buckets.len() {
            if let Some(n) = self.buckets[self.min_nonempty].pop_front() {
                self.pending[n] = false;
                return Some(n);
            }
            self.min_nonempty += 1;
        }
        None
    }

    /// Whether every bucket is empty
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.is_empty())
    }

    /// Drop all queued nodes without deallocating the buckets, for reuse across FFRs
    pub fn clear(&mut self) {
        for b in self.buckets.iter_mut() {
            for n in b.drain(..) {
                self.pending[n] = false;
            }
        }
        self.min_nonempty = self.buckets.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        let mut q = EventQueue::new(4, 3);
        q.put(3, 2);
        q.put(1, 0);
        q.put(2, 1);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_dedup() {
        let mut q = EventQueue::new(2, 1);
        q.put(0, 1);
        q.put(0, 1);
        assert_eq!(q.pop(), Some(0));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_ties_in_insertion_order() {
        let mut q = EventQueue::new(3, 0);
        q.put(0, 0);
        q.put(1, 0);
        q.put(2, 0);
        assert_eq!(q.pop(), Some(0));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
    }
}
