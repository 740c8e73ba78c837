//! Portable block/wake emulation
//!
//! Waiters register in a process-wide table keyed by the word's address.
//! The word is compared while the table lock is held, and wakers take the
//! same lock, so a store that precedes `wake` is always seen either by the
//! comparison or by the wake.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};

use super::{Futex, WaitResult};

/// Lock order: `WAITERS` first, then a waiter's own `state`.
static WAITERS: Lazy<Mutex<HashMap<usize, VecDeque<Arc<Waiter>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

struct WaiterState {
    woken: bool,
    /// Address the waiter is currently queued on; changes on requeue.
    key: usize,
}

struct Waiter {
    state: Mutex<WaiterState>,
    cond: Condvar,
}

impl Waiter {
    fn new(key: usize) -> Self {
        Self {
            state: Mutex::new(WaiterState { woken: false, key }),
            cond: Condvar::new(),
        }
    }

    fn notify(&self) {
        let mut state = self.state.lock();
        state.woken = true;
        self.cond.notify_one();
    }
}

fn key_of(word: &AtomicU32) -> usize {
    word as *const AtomicU32 as usize
}

/// Condition-variable emulation of a futex
#[derive(Debug, Clone, Copy, Default)]
pub struct EmulatedFutex;

impl EmulatedFutex {
    /// Number of threads currently queued on `word`.
    pub fn waiters(word: &AtomicU32) -> usize {
        WAITERS.lock().get(&key_of(word)).map_or(0, VecDeque::len)
    }
}

impl Futex for EmulatedFutex {
    fn block_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> WaitResult {
        let key = key_of(word);
        let waiter = Arc::new(Waiter::new(key));
        {
            let mut table = WAITERS.lock();
            if word.load(Ordering::SeqCst) != expected {
                return WaitResult::Mismatch;
            }
            table.entry(key).or_default().push_back(Arc::clone(&waiter));
        }

        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut state = waiter.state.lock();
        while !state.woken {
            match deadline {
                Some(deadline) => {
                    if waiter.cond.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => waiter.cond.wait(&mut state),
            }
        }
        if state.woken {
            return WaitResult::Woken;
        }
        drop(state);

        // Timed out. Withdraw, unless a waker claimed us in the meantime.
        let mut table = WAITERS.lock();
        let state = waiter.state.lock();
        if state.woken {
            return WaitResult::Woken;
        }
        let mut now_empty = false;
        if let Some(queue) = table.get_mut(&state.key) {
            queue.retain(|queued| !Arc::ptr_eq(queued, &waiter));
            now_empty = queue.is_empty();
        }
        if now_empty {
            table.remove(&state.key);
        }
        WaitResult::TimedOut
    }

    fn wake(word: &AtomicU32, max_count: u32) -> usize {
        let key = key_of(word);
        let mut table = WAITERS.lock();
        let Some(queue) = table.get_mut(&key) else {
            return 0;
        };

        let mut woken = 0;
        while woken < max_count as usize {
            let Some(waiter) = queue.pop_front() else {
                break;
            };
            waiter.notify();
            woken += 1;
        }
        if queue.is_empty() {
            table.remove(&key);
        }
        woken
    }

    fn requeue(from: &AtomicU32, max_wake: u32, to: &AtomicU32, max_requeue: u32) -> usize {
        let from_key = key_of(from);
        let to_key = key_of(to);
        let mut table = WAITERS.lock();
        let Some(mut queue) = table.remove(&from_key) else {
            return 0;
        };

        let mut woken = 0;
        while woken < max_wake as usize {
            let Some(waiter) = queue.pop_front() else {
                break;
            };
            waiter.notify();
            woken += 1;
        }

        let mut moved = VecDeque::new();
        while moved.len() < max_requeue as usize {
            let Some(waiter) = queue.pop_front() else {
                break;
            };
            waiter.state.lock().key = to_key;
            moved.push_back(waiter);
        }

        if !queue.is_empty() {
            table.insert(from_key, queue);
        }
        if !moved.is_empty() {
            table.entry(to_key).or_default().extend(moved);
        }
        woken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn wait_for_waiters(word: &AtomicU32, count: usize) {
        while EmulatedFutex::waiters(word) < count {
            thread::yield_now();
        }
    }

    #[test]
    fn mismatch_returns_immediately() {
        let word = AtomicU32::new(3);
        assert_eq!(EmulatedFutex::block_wait(&word, 2, None), WaitResult::Mismatch);
        assert_eq!(EmulatedFutex::waiters(&word), 0);
    }

    #[test]
    fn timeout_withdraws_the_waiter() {
        let word = AtomicU32::new(0);
        let start = Instant::now();
        let result = EmulatedFutex::block_wait(&word, 0, Some(Duration::from_millis(20)));
        assert_eq!(result, WaitResult::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(EmulatedFutex::waiters(&word), 0);
    }

    #[test]
    fn wake_counts_only_parked_threads() {
        let word = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || EmulatedFutex::block_wait(&word, 0, None))
            })
            .collect();

        wait_for_waiters(&word, 3);
        assert_eq!(EmulatedFutex::wake(&word, 2), 2);
        assert_eq!(EmulatedFutex::wake(&word, 10), 1);
        assert_eq!(EmulatedFutex::wake(&word, 10), 0);

        for handle in handles {
            assert_eq!(handle.join().unwrap(), WaitResult::Woken);
        }
    }

    #[test]
    fn requeue_moves_remaining_waiters() {
        let from = Arc::new(AtomicU32::new(0));
        let to = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let from = Arc::clone(&from);
                thread::spawn(move || EmulatedFutex::block_wait(&from, 0, None))
            })
            .collect();

        wait_for_waiters(&from, 3);
        assert_eq!(EmulatedFutex::requeue(&from, 1, &to, 2), 1);
        assert_eq!(EmulatedFutex::waiters(&from), 0);
        assert_eq!(EmulatedFutex::waiters(&to), 2);

        // Waking the old word reaches nobody now.
        assert_eq!(EmulatedFutex::wake(&from, 10), 0);
        assert_eq!(EmulatedFutex::wake(&to, 10), 2);

        for handle in handles {
            assert_eq!(handle.join().unwrap(), WaitResult::Woken);
        }
    }
}
