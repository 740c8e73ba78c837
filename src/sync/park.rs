//! Parking lot for idle workers
//!
//! A single 32-bit word serves as the rendezvous point. Bit 0 is the stop
//! flag; the upper bits form a generation counter that `signal` advances by
//! two per announced task. The value carries no count of pending tasks, it
//! only tells a waiter that something changed since its snapshot.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crossbeam::utils::CachePadded;

use super::futex::{Futex, OsFutex, WaitResult};

const STOP_BIT: u32 = 1;

/// Largest wake request handed to the primitive in one call.
const WAKE_ALL: u32 = i32::MAX as u32;

/// Snapshot of a [`ParkingLot`] taken before deciding to park
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct State {
    val: u32,
}

impl State {
    /// Whether the lot had been stopped when this snapshot was taken
    pub fn stopped(&self) -> bool {
        self.val & STOP_BIT != 0
    }
}

/// Park idle workers until new work is signalled
pub struct ParkingLot<F: Futex = OsFutex> {
    pending_signal: CachePadded<AtomicU32>,
    _futex: PhantomData<fn() -> F>,
}

impl<F: Futex> ParkingLot<F> {
    /// Create a lot with nobody parked and the stop flag clear
    pub fn new() -> Self {
        Self {
            pending_signal: CachePadded::new(AtomicU32::new(0)),
            _futex: PhantomData,
        }
    }

    /// Wake up at most `num_task` parked workers.
    ///
    /// Returns the number of workers actually woken, which may be zero.
    pub fn signal(&self, num_task: u32) -> usize {
        // Shifted so the stop bit is never touched.
        self.pending_signal
            .fetch_add(num_task.wrapping_mul(2), Ordering::Release);
        F::wake(&self.pending_signal, num_task)
    }

    /// Snapshot the lot for a later [`ParkingLot::wait`].
    ///
    /// Take it after finding no work and re-check for work before waiting;
    /// any `signal` issued after the snapshot makes the wait return at once.
    pub fn get_state(&self) -> State {
        State {
            val: self.pending_signal.load(Ordering::Acquire),
        }
    }

    /// Park until signalled. Returns immediately if the lot changed since
    /// `expected_state` was taken or the snapshot already shows a stopped
    /// lot. May return spuriously.
    pub fn wait(&self, expected_state: State) -> WaitResult {
        self.block(expected_state, None)
    }

    /// Like [`ParkingLot::wait`], giving up after `timeout`.
    pub fn wait_timeout(&self, expected_state: State, timeout: Duration) -> WaitResult {
        self.block(expected_state, Some(timeout))
    }

    fn block(&self, expected_state: State, timeout: Option<Duration>) -> WaitResult {
        if expected_state.stopped() {
            return WaitResult::Mismatch;
        }
        F::block_wait(&self.pending_signal, expected_state.val, timeout)
    }

    /// Wake every parked worker and make all later waits return at once.
    ///
    /// Returns how many workers were woken.
    pub fn stop(&self) -> usize {
        self.pending_signal.fetch_or(STOP_BIT, Ordering::SeqCst);

        // Stopped snapshots never block and pre-stop snapshots no longer
        // match the word, so this drains.
        let mut woken = 0;
        loop {
            let batch = F::wake(&self.pending_signal, WAKE_ALL);
            if batch == 0 {
                break;
            }
            woken += batch;
        }
        log::debug!("parking lot stopped, woke {} waiters", woken);
        woken
    }

    /// Whether [`ParkingLot::stop`] has been called
    pub fn is_stopped(&self) -> bool {
        self.get_state().stopped()
    }
}

impl<F: Futex> Default for ParkingLot<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Futex> fmt::Debug for ParkingLot<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParkingLot")
            .field("pending_signal", &self.pending_signal.load(Ordering::Relaxed))
            .finish()
    }
}
