//! Deadline-ordered job set
//!
//! Jobs leave the set in ascending deadline order. Jobs sharing a deadline
//! leave in insertion order.

use crate::core::Work;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// A work item waiting for its deadline
pub(crate) struct TimerJob {
    deadline: Duration,
    /// Insertion sequence, breaks ties between equal deadlines
    sequence: u64,
    work: Work,
}

impl TimerJob {
    pub(crate) fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Earliest deadline is "greatest"; if equal, earlier sequence (FIFO)
impl PartialEq for TimerJob {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for TimerJob {}

impl PartialOrd for TimerJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on both keys because BinaryHeap is a max-heap
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Min-heap of timer jobs keyed by deadline
#[derive(Default)]
pub(crate) struct DeadlineSet {
    heap: BinaryHeap<TimerJob>,
    next_sequence: u64,
}

impl DeadlineSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a job
    pub(crate) fn push(&mut self, deadline: Duration, work: Work) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(TimerJob {
            deadline,
            sequence,
            work,
        });
    }

    /// Deadline of the job that fires next
    pub(crate) fn earliest(&self) -> Option<Duration> {
        self.heap.peek().map(TimerJob::deadline)
    }

    /// Remove every job whose deadline is `<= now`, in firing order
    pub(crate) fn pop_due(&mut self, now: Duration) -> Vec<Work> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|job| job.deadline <= now) {
            if let Some(job) = self.heap.pop() {
                due.push(job.work);
            }
        }
        due
    }

    /// Remove every job regardless of deadline
    pub(crate) fn take_all(&mut self) -> Vec<Work> {
        std::mem::take(&mut self.heap)
            .into_vec()
            .into_iter()
            .map(|job| job.work)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
