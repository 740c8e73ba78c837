//! Worker group coordination
//!
//! Wires one queue per worker to a fixed set of parking lot shards. Threads
//! are not created here; callers move each [`Worker`] into a thread of their
//! own choosing.

use std::fmt;
use std::sync::Arc;

use crossbeam::utils::CachePadded;

use super::queue::{Stealer, WorkStealingQueue};
use super::steal::{StealStats, WorkStealer};
use super::worker::{Worker, WorkerCounters, WorkerId, WorkerStats};
use crate::config::SubstrateConfig;
use crate::error::Result;
use crate::sync::ParkingLot;

/// Group statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStats {
    /// Per-worker statistics, indexed by worker id
    pub workers: Vec<WorkerStats>,
    /// Aggregate stealing statistics
    pub steals: StealStats,
}

impl GroupStats {
    /// Approximate number of items queued across all workers
    pub fn queued(&self) -> usize {
        self.workers.iter().map(|worker| worker.queue_size).sum()
    }
}

/// Shared state of a set of workers
pub struct WorkerGroup<T> {
    config: SubstrateConfig,
    stealers: Vec<Stealer<T>>,
    lots: Vec<ParkingLot>,
    work_stealer: WorkStealer,
    counters: Vec<CachePadded<WorkerCounters>>,
}

impl<T> WorkerGroup<T> {
    /// Build a group and the owner handle of every worker in it
    pub fn new(config: SubstrateConfig) -> Result<(Arc<Self>, Vec<Worker<T>>)> {
        config.validate()?;
        let num_workers = config.worker_count();

        let queues = (0..num_workers)
            .map(|_| WorkStealingQueue::with_capacity(config.queue_capacity))
            .collect::<Result<Vec<_>>>()?;

        let group = Arc::new(WorkerGroup {
            stealers: queues.iter().map(WorkStealingQueue::stealer).collect(),
            lots: (0..config.parking_lot_shards).map(|_| ParkingLot::new()).collect(),
            work_stealer: WorkStealer::new(config.steal_strategy),
            counters: (0..num_workers).map(|_| CachePadded::default()).collect(),
            config,
        });

        let workers = queues
            .into_iter()
            .enumerate()
            .map(|(i, queue)| Worker::new(WorkerId(i), queue, Arc::clone(&group)))
            .collect();

        log::info!(
            "Worker group created with {} workers over {} parking lots",
            num_workers,
            group.lots.len()
        );
        Ok((group, workers))
    }

    /// Configuration the group was built with
    pub fn config(&self) -> &SubstrateConfig {
        &self.config
    }

    /// Get the number of workers
    pub fn num_workers(&self) -> usize {
        self.stealers.len()
    }

    /// Thief handle on a worker's queue
    pub fn stealer(&self, worker: WorkerId) -> Option<&Stealer<T>> {
        self.stealers.get(worker.as_usize())
    }

    /// Parking lot shard a worker sleeps in
    pub fn lot_for(&self, worker: WorkerId) -> &ParkingLot {
        &self.lots[worker.as_usize() % self.lots.len()]
    }

    /// Announce `num_task` new items published by `origin`.
    ///
    /// Starts at the origin's shard and moves on to the next ones until
    /// enough sleepers have been woken. Every visited shard's generation
    /// advances, so workers about to park there will not sleep through it.
    /// Returns the number of workers woken.
    pub fn signal(&self, origin: WorkerId, num_task: u32) -> usize {
        let shards = self.lots.len();
        let start = origin.as_usize() % shards;
        let mut remaining = num_task as usize;
        let mut woken = 0;
        for offset in 0..shards {
            if remaining == 0 {
                break;
            }
            let n = self.lots[(start + offset) % shards].signal(remaining as u32);
            woken += n;
            remaining = remaining.saturating_sub(n);
        }
        woken
    }

    /// Steal one item for `thief` from any other worker
    pub fn steal_for(&self, thief: WorkerId) -> Option<T> {
        self.work_stealer.steal_from(thief, &self.stealers)
    }

    /// Stop every shard: all parked workers wake, and `wait_for_task`
    /// returns `None` once no work is left. Returns the number woken.
    pub fn stop(&self) -> usize {
        let woken: usize = self.lots.iter().map(ParkingLot::stop).sum();
        log::info!("Worker group stopped, woke {} parked workers", woken);
        woken
    }

    /// Check if the group has been stopped
    pub fn is_stopped(&self) -> bool {
        self.lots.iter().all(ParkingLot::is_stopped)
    }

    /// Get group statistics. Queue sizes are approximate.
    pub fn stats(&self) -> GroupStats {
        GroupStats {
            workers: self
                .counters
                .iter()
                .zip(&self.stealers)
                .map(|(counters, stealer)| counters.snapshot(stealer.volatile_size()))
                .collect(),
            steals: self.work_stealer.stats(),
        }
    }

    pub(crate) fn counters(&self, worker: WorkerId) -> &WorkerCounters {
        &self.counters[worker.as_usize()]
    }
}

impl<T> fmt::Debug for WorkerGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("num_workers", &self.num_workers())
            .field("shards", &self.lots.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
