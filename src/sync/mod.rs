//! Blocking side of the substrate
//!
//! [`futex`] wraps the platform block/wake primitive and [`park`] builds the
//! parking lot idle workers sleep in.

pub mod futex;
pub mod park;

pub use futex::{EmulatedFutex, Futex, OsFutex, WaitResult};
#[cfg(target_os = "linux")]
pub use futex::LinuxFutex;
pub use park::{ParkingLot, State};
