//! Common test harness for routine-substrate tests
//!
//! Helpers for running many racing trials and for checking that every
//! tagged item was consumed exactly once.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use routine_substrate::Stealer;

/// Trials for tests that race two operations against each other
pub const RACE_TRIALS: usize = 2_000;

/// Assert that `consumed` holds each of `0..expected` exactly once
pub fn assert_exactly_once(mut consumed: Vec<usize>, expected: usize) {
    consumed.sort_unstable();
    let duplicates = consumed.windows(2).filter(|pair| pair[0] == pair[1]).count();
    assert_eq!(duplicates, 0, "{} items were delivered twice", duplicates);
    assert_eq!(
        consumed.len(),
        expected,
        "{} items were lost",
        expected.saturating_sub(consumed.len())
    );
    assert!(consumed.iter().copied().eq(0..expected));
}

/// Spawn `count` thieves that steal until `done` is set and the victim
/// looks empty. Each returns the ids it stole.
pub fn spawn_thieves(
    stealer: &Stealer<Box<usize>>,
    count: usize,
    done: &Arc<AtomicBool>,
) -> Vec<JoinHandle<Vec<usize>>> {
    (0..count)
        .map(|_| {
            let stealer = stealer.clone();
            let done = Arc::clone(done);
            thread::spawn(move || {
                let mut stolen = Vec::new();
                loop {
                    match stealer.steal() {
                        Some(item) => stolen.push(*item),
                        None if done.load(Ordering::Acquire) && stealer.is_empty() => break,
                        None => thread::yield_now(),
                    }
                }
                stolen
            })
        })
        .collect()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}
