//! Error types for routine-substrate
//!
//! Only configuration problems are errors. An empty or full queue and a lost
//! steal race are ordinary outcomes and are reported through `Option`/`Result`
//! values carrying the item, never through this type.

use thiserror::Error;

/// Main error type for routine-substrate operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `init` was called on a queue that already has a buffer
    #[error("Work-stealing queue is already initialized")]
    AlreadyInitialized,

    /// Queue capacity is zero or not a power of two
    #[error("Invalid capacity={capacity}, must be a non-zero power of 2")]
    InvalidCapacity {
        /// The rejected capacity
        capacity: usize,
    },

    /// The backing buffer could not be allocated
    #[error("Failed to allocate a buffer of {capacity} slots")]
    AllocationFailed {
        /// The capacity that could not be allocated
        capacity: usize,
    },

    /// A substrate configuration value is unusable
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which setting was rejected and why
        reason: String,
    },
}

/// Convenient result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = Error::InvalidCapacity { capacity: 12 };
        assert_eq!(
            err.to_string(),
            "Invalid capacity=12, must be a non-zero power of 2"
        );

        let err = Error::InvalidConfig {
            reason: "parking_lot_shards must be at least 1".to_string(),
        };
        assert!(err.to_string().contains("parking_lot_shards"));
    }
}
