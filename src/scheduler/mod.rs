//! Queue side of the substrate
//!
//! Each worker owns one bounded work-stealing queue; idle workers steal from
//! the others and park in a sharded set of parking lots when nothing is left.

pub mod core;
pub mod queue;
pub mod steal;
pub mod worker;

pub use self::core::{GroupStats, WorkerGroup};
pub use queue::{Stealer, WorkStealingQueue};
pub use steal::{StealStats, StealStrategy, WorkStealer};
pub use worker::{Worker, WorkerId, WorkerStats};
