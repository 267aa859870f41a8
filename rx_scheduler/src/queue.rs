use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rx_subscription::{Subscription, SubscriptionLike};

use crate::traits::Action;

/// One entry in a worker's queue: a due-time, an insertion sequence to break ties (stable
/// FIFO at equal times), the action itself, and the subscription guarding it so the
/// executor can skip actions cancelled before they were dequeued.
pub(crate) struct ScheduledItem {
    pub due_time: i64,
    pub seq: u64,
    pub action: Action,
    pub subscription: Subscription,
}

impl PartialEq for ScheduledItem {
    fn eq(&self, other: &Self) -> bool {
        self.due_time == other.due_time && self.seq == other.seq
    }
}
impl Eq for ScheduledItem {}

impl PartialOrd for ScheduledItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest due-time (and, for ties, the
        // earliest insertion) sits at the top.
        other
            .due_time
            .cmp(&self.due_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A due-time-ordered queue shared by the trampoline and event-loop workers.
pub(crate) struct ActionQueue {
    heap: BinaryHeap<ScheduledItem>,
    next_seq: u64,
}

impl ActionQueue {
    pub fn new() -> Self {
        ActionQueue { heap: BinaryHeap::new(), next_seq: 0 }
    }

    pub fn push(&mut self, due_time: i64, action: Action, subscription: Subscription) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledItem { due_time, seq, action, subscription });
    }

    pub fn peek_due_time(&self) -> Option<i64> {
        self.heap.peek().map(|item| item.due_time)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pop the next item regardless of due-time, skipping any already-unsubscribed action.
    pub fn pop_ready(&mut self) -> Option<ScheduledItem> {
        while let Some(item) = self.heap.pop() {
            if item.subscription.is_subscribed() {
                return Some(item);
            }
        }
        None
    }
}
