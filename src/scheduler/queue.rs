//! Pending job queue
//!
//! A max-heap keyed on (priority, submission sequence). Higher priority
//! dispatches first; equal priorities dispatch in submission order. Jobs
//! deferred by a cycle are restored with their original sequence number, so
//! their relative order survives any number of cycles.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::job::Job;

/// A job waiting in the queue together with its ordering key.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    seq: u64,
    pub job: Job,
}

impl QueuedJob {
    /// Submission sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.job
            .priority
            .cmp(&other.job.priority)
            // Earlier submissions rank higher among equal priorities
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority-ordered queue of jobs awaiting admission
#[derive(Debug, Default)]
pub struct PendingQueue {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a newly submitted job
    pub fn push(&mut self, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedJob { seq, job });
    }

    /// Put back a job taken out with [`pop`](Self::pop), keeping its place
    pub fn restore(&mut self, entry: QueuedJob) {
        self.heap.push(entry);
    }

    /// Take the next job in dispatch order
    pub fn pop(&mut self) -> Option<QueuedJob> {
        self.heap.pop()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.heap.iter().any(|e| e.job.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.heap.iter().map(|e| &e.job).find(|j| j.id() == id)
    }

    /// Remove a job regardless of its position
    pub fn remove(&mut self, id: &str) -> Option<Job> {
        let mut found = None;
        let entries = std::mem::take(&mut self.heap).into_vec();
        for entry in entries {
            if found.is_none() && entry.job.id() == id {
                found = Some(entry.job);
            } else {
                self.heap.push(entry);
            }
        }
        found
    }

    /// Jobs in dispatch order
    pub fn jobs(&self) -> Vec<&Job> {
        let mut entries: Vec<&QueuedJob> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| &e.job).collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
