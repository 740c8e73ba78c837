//! Owner side of a worker
//!
//! A [`Worker`] owns one queue of its [`WorkerGroup`] and is the only place
//! `push` and `pop` are called from. Move it into the thread that runs it.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::core::WorkerGroup;
use super::queue::WorkStealingQueue;
use crate::sync::{State, WaitResult};

/// Unique identifier for a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl WorkerId {
    /// Get the numeric ID
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Statistics for one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Items pushed into the worker's own queue
    pub tasks_pushed: usize,
    /// Items taken back from its own queue
    pub tasks_popped: usize,
    /// Items stolen from other workers
    pub tasks_stolen: usize,
    /// Number of times the worker went to sleep
    pub park_count: usize,
    /// Approximate depth of the worker's queue
    pub queue_size: usize,
}

#[derive(Debug, Default)]
pub(crate) struct WorkerCounters {
    pub(crate) tasks_pushed: AtomicUsize,
    pub(crate) tasks_popped: AtomicUsize,
    pub(crate) tasks_stolen: AtomicUsize,
    pub(crate) park_count: AtomicUsize,
}

impl WorkerCounters {
    pub(crate) fn snapshot(&self, queue_size: usize) -> WorkerStats {
        WorkerStats {
            tasks_pushed: self.tasks_pushed.load(Ordering::Relaxed),
            tasks_popped: self.tasks_popped.load(Ordering::Relaxed),
            tasks_stolen: self.tasks_stolen.load(Ordering::Relaxed),
            park_count: self.park_count.load(Ordering::Relaxed),
            queue_size,
        }
    }
}

/// A worker's exclusive handle on its queue
pub struct Worker<T> {
    id: WorkerId,
    queue: WorkStealingQueue<T>,
    group: Arc<WorkerGroup<T>>,
}

impl<T> Worker<T> {
    pub(crate) fn new(id: WorkerId, queue: WorkStealingQueue<T>, group: Arc<WorkerGroup<T>>) -> Self {
        Self { id, queue, group }
    }

    /// Get worker ID
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The group this worker belongs to
    pub fn group(&self) -> &Arc<WorkerGroup<T>> {
        &self.group
    }

    /// This worker's queue
    pub fn queue(&self) -> &WorkStealingQueue<T> {
        &self.queue
    }

    /// Queue an item locally and wake one parked worker to share the load.
    ///
    /// Hands the item back if the queue is full.
    pub fn push(&self, item: T) -> Result<(), T> {
        self.queue.push(item)?;
        self.group
            .counters(self.id)
            .tasks_pushed
            .fetch_add(1, Ordering::Relaxed);
        self.group.signal(self.id, 1);
        Ok(())
    }

    /// Next item without blocking: newest local item first, then the oldest
    /// item of some other worker
    pub fn next_task(&self) -> Option<T> {
        let counters = self.group.counters(self.id);
        if let Some(task) = self.queue.pop() {
            counters.tasks_popped.fetch_add(1, Ordering::Relaxed);
            return Some(task);
        }
        let task = self.group.steal_for(self.id)?;
        counters.tasks_stolen.fetch_add(1, Ordering::Relaxed);
        Some(task)
    }

    /// Next item, parking while there is none.
    ///
    /// Returns `None` once the group has been stopped and no work is left
    /// within reach.
    pub fn wait_for_task(&self) -> Option<T> {
        let lot = self.group.lot_for(self.id);
        loop {
            if let Some(task) = self.next_task() {
                return Some(task);
            }

            let state = lot.get_state();
            if state.stopped() {
                return None;
            }
            // Work signalled before the snapshot is visible now; anything
            // later changes the word and cuts the wait short.
            if let Some(task) = self.next_task() {
                return Some(task);
            }

            self.park(state);
        }
    }

    /// Wait on this worker's lot, counting the wait only if it slept.
    fn park(&self, state: State) -> WaitResult {
        let lot = self.group.lot_for(self.id);
        let result = match self.group.config().park_timeout {
            Some(timeout) => lot.wait_timeout(state, timeout),
            None => lot.wait(state),
        };
        if result != WaitResult::Mismatch {
            self.group
                .counters(self.id)
                .park_count
                .fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

impl<T> fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .finish()
    }
}
