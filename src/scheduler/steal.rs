//! Victim selection for thieves
//!
//! Picks the order in which an idle worker visits the other workers'
//! queues. Ordering only affects latency; correctness comes from the queue.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;
use rand::thread_rng;

use super::queue::Stealer;
use super::worker::WorkerId;

/// Work-stealing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StealStrategy {
    /// Random victim order (default)
    #[default]
    Random,
    /// Rotate the starting victim on every attempt
    RoundRobin,
    /// Nearest worker ids first, expanding outward
    Nearest,
}

/// Snapshot of stealing statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StealStats {
    /// Calls to [`WorkStealer::steal_from`]
    pub steal_attempts: usize,
    /// Attempts that came back with an item
    pub successful_steals: usize,
    /// Attempts that found every victim empty
    pub failed_steals: usize,
}

#[derive(Debug, Default)]
struct StealCounters {
    steal_attempts: AtomicUsize,
    successful_steals: AtomicUsize,
    failed_steals: AtomicUsize,
}

/// Work-stealing coordinator
#[derive(Debug)]
pub struct WorkStealer {
    strategy: StealStrategy,
    round_robin: AtomicUsize,
    stats: StealCounters,
}

impl WorkStealer {
    /// Create a new work stealer with the given strategy
    pub fn new(strategy: StealStrategy) -> Self {
        Self {
            strategy,
            round_robin: AtomicUsize::new(0),
            stats: StealCounters::default(),
        }
    }

    /// Try each victim once, in strategy order, and return the first item
    /// stolen. `victims` is indexed by worker id; the thief's own queue is
    /// skipped.
    pub fn steal_from<T>(&self, thief: WorkerId, victims: &[Stealer<T>]) -> Option<T> {
        self.stats.steal_attempts.fetch_add(1, Ordering::Relaxed);

        let stolen = self
            .victim_order(thief, victims.len())
            .into_iter()
            .find_map(|victim| victims[victim.as_usize()].steal());

        let counter = if stolen.is_some() {
            &self.stats.successful_steals
        } else {
            &self.stats.failed_steals
        };
        counter.fetch_add(1, Ordering::Relaxed);
        stolen
    }

    /// Order in which `thief` should visit the other `num_workers` workers
    pub fn victim_order(&self, thief: WorkerId, num_workers: usize) -> Vec<WorkerId> {
        let others = (0..num_workers).filter(|&i| i != thief.as_usize());

        match self.strategy {
            StealStrategy::Random => {
                let mut victims: Vec<WorkerId> = others.map(WorkerId).collect();
                victims.shuffle(&mut thread_rng());
                victims
            }
            StealStrategy::RoundRobin => {
                if num_workers == 0 {
                    return Vec::new();
                }
                let start = self.round_robin.fetch_add(1, Ordering::Relaxed) % num_workers;
                (0..num_workers)
                    .map(|offset| (start + offset) % num_workers)
                    .filter(|&i| i != thief.as_usize())
                    .map(WorkerId)
                    .collect()
            }
            StealStrategy::Nearest => {
                let mut victims: Vec<WorkerId> = others.map(WorkerId).collect();
                let thief = thief.as_usize();
                victims.sort_by_key(|victim| (victim.as_usize().abs_diff(thief), victim.as_usize()));
                victims
            }
        }
    }

    /// Get stealing statistics
    pub fn stats(&self) -> StealStats {
        StealStats {
            steal_attempts: self.stats.steal_attempts.load(Ordering::Relaxed),
            successful_steals: self.stats.successful_steals.load(Ordering::Relaxed),
            failed_steals: self.stats.failed_steals.load(Ordering::Relaxed),
        }
    }

    /// Get the current strategy
    pub fn strategy(&self) -> StealStrategy {
        self.strategy
    }
}

impl Default for WorkStealer {
    fn default() -> Self {
        Self::new(StealStrategy::default())
    }
}
