//! Substrate configuration
//!
//! Sizing for a [`WorkerGroup`](crate::scheduler::WorkerGroup): how many
//! workers, how deep each queue is, and how many parking lot shards the
//! workers are spread over.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::scheduler::StealStrategy;

/// Default slots per worker queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Default number of parking lot shards
pub const DEFAULT_PARKING_LOT_SHARDS: usize = 4;

/// Substrate configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstrateConfig {
    /// Number of workers (0 = number of CPU cores)
    pub num_workers: usize,
    /// Slots per worker queue, a non-zero power of two
    pub queue_capacity: usize,
    /// Number of parking lots workers are hashed over
    pub parking_lot_shards: usize,
    /// Victim order for idle workers
    pub steal_strategy: StealStrategy,
    /// Upper bound on a single park; `None` parks until signalled
    pub park_timeout: Option<Duration>,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            parking_lot_shards: DEFAULT_PARKING_LOT_SHARDS,
            steal_strategy: StealStrategy::Random,
            park_timeout: None,
        }
    }
}

impl SubstrateConfig {
    /// Number of workers after resolving 0 to the CPU count
    pub fn worker_count(&self) -> usize {
        if self.num_workers == 0 {
            num_cpus::get()
        } else {
            self.num_workers
        }
    }

    /// Check the settings before any queue is allocated
    pub fn validate(&self) -> Result<()> {
        if !self.queue_capacity.is_power_of_two() {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "queue_capacity={} must be a non-zero power of 2",
                    self.queue_capacity
                ),
            });
        }
        if self.parking_lot_shards == 0 {
            return Err(Error::InvalidConfig {
                reason: "parking_lot_shards must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SubstrateConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_count() > 0);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_zero_workers_means_cpu_count() {
        let config = SubstrateConfig {
            num_workers: 0,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), num_cpus::get());
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let config = SubstrateConfig {
            queue_capacity: 1000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));

        let config = SubstrateConfig {
            parking_lot_shards: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }
}
