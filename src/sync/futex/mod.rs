//! Block/wake primitive on a 32-bit word
//!
//! Everything above this module only relies on the [`Futex`] contract:
//! `block_wait` re-checks the word atomically with going to sleep, so a
//! waker that changes the word before calling `wake` can never be missed.
//! Linux uses the real `futex(2)` syscall; other targets use a
//! condition-variable emulation with the same semantics.

use std::sync::atomic::AtomicU32;
use std::time::Duration;

mod emulated;
#[cfg(target_os = "linux")]
mod linux;

pub use emulated::EmulatedFutex;
#[cfg(target_os = "linux")]
pub use linux::LinuxFutex;

/// The block/wake primitive native to the target platform
#[cfg(target_os = "linux")]
pub type OsFutex = LinuxFutex;

/// The block/wake primitive native to the target platform
#[cfg(not(target_os = "linux"))]
pub type OsFutex = EmulatedFutex;

/// How a `block_wait` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The thread blocked and was woken, or returned spuriously
    Woken,
    /// The word no longer held the expected value; the thread never blocked
    Mismatch,
    /// The timeout elapsed before any wake arrived
    TimedOut,
}

/// Process-private block/wake operations keyed by the address of a word
pub trait Futex {
    /// Block while `word` still equals `expected`, for at most `timeout`.
    ///
    /// The comparison and the decision to sleep are atomic with respect to
    /// [`Futex::wake`] on the same word. Callers must tolerate spurious
    /// [`WaitResult::Woken`] returns.
    fn block_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> WaitResult;

    /// Wake at most `max_count` threads blocked on `word`.
    ///
    /// Returns how many were actually woken, 0 if nobody was waiting.
    fn wake(word: &AtomicU32, max_count: u32) -> usize;

    /// Wake at most `max_wake` waiters of `from` and move up to `max_requeue`
    /// of the remaining ones to wait on `to` instead. Returns the number woken.
    fn requeue(from: &AtomicU32, max_wake: u32, to: &AtomicU32, max_requeue: u32) -> usize;
}
