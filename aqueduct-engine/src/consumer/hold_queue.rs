//! Holds delayed updates until their delivery time.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use aqueduct_shared::DelayedUpdate;

struct Held {
    deliver_at: DateTime<Utc>,
    seq: u64,
    update: DelayedUpdate,
}

impl PartialEq for Held {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Held {}

impl PartialOrd for Held {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Held {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deliver_at, self.seq).cmp(&(other.deliver_at, other.seq))
    }
}

/// Delayed updates ordered by `deliver_at`, ties in arrival order.
#[derive(Default)]
pub struct HoldQueue {
    heap: BinaryHeap<Reverse<Held>>,
    next_seq: u64,
}

impl HoldQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, update: DelayedUpdate) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Held {
            deliver_at: update.deliver_at,
            seq,
            update,
        }));
    }

    /// Remove and return every update due at `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<DelayedUpdate> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(held)| held.deliver_at <= now)
        {
            if let Some(Reverse(held)) = self.heap.pop() {
                due.push(held.update);
            }
        }
        due
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|Reverse(held)| held.deliver_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
