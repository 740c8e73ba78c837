//! # routine-substrate
//!
//! Synchronization substrate for M:N schedulers: the pieces that move work
//! between worker threads and put idle workers to sleep.
//!
//! ## Features
//!
//! - **Work-stealing queues**: bounded Chase-Lev deques; the owner pushes and
//!   pops at one end while any number of thieves steal from the other
//! - **Parking lots**: futex-backed rendezvous points that cannot lose a
//!   wakeup between "no work found" and "going to sleep"
//! - **Worker groups**: one queue per worker plus sharded parking lots, wired
//!   together with victim selection and statistics
//!
//! ## Quick Start
//!
//! ```rust
//! use routine_substrate::prelude::*;
//!
//! let queue = WorkStealingQueue::with_capacity(4).unwrap();
//! let stealer = queue.stealer();
//!
//! for item in ["a", "b", "c"] {
//!     queue.push(item).unwrap();
//! }
//! assert_eq!(queue.pop(), Some("c"));
//! assert_eq!(stealer.steal(), Some("a"));
//!
//! let lot: ParkingLot = ParkingLot::new();
//! let state = lot.get_state();
//! lot.signal(1);
//! // The snapshot is stale, so this returns without sleeping.
//! lot.wait(state);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod scheduler;
pub mod sync;

/// Convenient re-exports for common functionality
pub mod prelude {
    pub use crate::config::SubstrateConfig;
    pub use crate::error::{Error, Result};
    pub use crate::scheduler::{
        GroupStats, StealStrategy, Stealer, WorkStealingQueue, Worker, WorkerGroup, WorkerId,
    };
    pub use crate::sync::{ParkingLot, State, WaitResult};
}

pub use prelude::*;
