//! `futex(2)` backed implementation

use std::io;
use std::ptr;
use std::sync::atomic::AtomicU32;
use std::time::Duration;

use super::{Futex, WaitResult};

const FUTEX_WAIT_PRIVATE: libc::c_int = libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG;
const FUTEX_WAKE_PRIVATE: libc::c_int = libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG;
const FUTEX_REQUEUE_PRIVATE: libc::c_int = libc::FUTEX_REQUEUE | libc::FUTEX_PRIVATE_FLAG;

/// Linux futex, restricted to the calling process
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxFutex;

fn to_timespec(timeout: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as _,
    }
}

/// Saturate a count to what the kernel accepts as a positive `int`.
fn clamp_count(count: u32) -> libc::c_int {
    count.min(libc::c_int::MAX as u32) as libc::c_int
}

impl Futex for LinuxFutex {
    fn block_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> WaitResult {
        let timeout = timeout.map(to_timespec);
        let timeout_ptr = timeout
            .as_ref()
            .map_or(ptr::null(), |ts| ts as *const libc::timespec);

        // SAFETY: `word` outlives the call and FUTEX_WAIT only reads the
        // aligned 32-bit value behind it. The timespec lives on this frame.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word as *const AtomicU32,
                FUTEX_WAIT_PRIVATE,
                expected,
                timeout_ptr,
                ptr::null::<u32>(),
                0u32,
            )
        };
        if rc == 0 {
            return WaitResult::Woken;
        }

        match io::Error::last_os_error().raw_os_error() {
            Some(libc::EAGAIN) => WaitResult::Mismatch,
            Some(libc::ETIMEDOUT) => WaitResult::TimedOut,
            Some(libc::EINTR) => WaitResult::Woken,
            errno => {
                log::warn!("futex wait failed with errno {:?}", errno);
                WaitResult::Woken
            }
        }
    }

    fn wake(word: &AtomicU32, max_count: u32) -> usize {
        // SAFETY: FUTEX_WAKE only uses the address as a key.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_futex,
                word as *const AtomicU32,
                FUTEX_WAKE_PRIVATE,
                clamp_count(max_count),
                ptr::null::<libc::timespec>(),
                ptr::null::<u32>(),
                0u32,
            )
        };
        if rc < 0 {
            log::warn!("futex wake failed: {}", io::Error::last_os_error());
            return 0;
        }
        rc as usize
    }

    fn requeue(from: &AtomicU32, max_wake: u32, to: &AtomicU32, max_requeue: u32) -> usize {
        // FUTEX_REQUEUE reads the requeue limit from the timeout slot.
        // SAFETY: both addresses are only used as keys.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_futex,
                from as *const AtomicU32,
                FUTEX_REQUEUE_PRIVATE,
                clamp_count(max_wake),
                clamp_count(max_requeue) as libc::c_ulong,
                to as *const AtomicU32,
                0u32,
            )
        };
        if rc < 0 {
            log::warn!("futex requeue failed: {}", io::Error::last_os_error());
            return 0;
        }
        // The kernel reports woken + requeued; only the first part is a wake.
        (rc as usize).min(max_wake as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_on_changed_word_does_not_block() {
        let word = AtomicU32::new(7);
        assert_eq!(LinuxFutex::block_wait(&word, 6, None), WaitResult::Mismatch);
    }

    #[test]
    fn wait_times_out() {
        let word = AtomicU32::new(0);
        let timeout = Duration::from_millis(20);
        // A signal can interrupt the sleep; only a full timeout counts.
        for _ in 0..10 {
            let start = Instant::now();
            match LinuxFutex::block_wait(&word, 0, Some(timeout)) {
                WaitResult::Woken => continue,
                result => {
                    assert_eq!(result, WaitResult::TimedOut);
                    assert!(start.elapsed() >= timeout);
                    return;
                }
            }
        }
        panic!("wait never timed out");
    }

    #[test]
    fn wake_without_waiters_reports_zero() {
        let word = AtomicU32::new(0);
        assert_eq!(LinuxFutex::wake(&word, 16), 0);
    }

    #[test]
    fn wake_releases_a_blocked_thread() {
        let word = Arc::new(AtomicU32::new(0));
        let waiter_word = Arc::clone(&word);
        let waiter = thread::spawn(move || {
            LinuxFutex::block_wait(&waiter_word, 0, Some(Duration::from_secs(5)))
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut woken = 0;
        while woken == 0 && Instant::now() < deadline {
            woken = LinuxFutex::wake(&word, 1);
            thread::yield_now();
        }
        assert_eq!(woken, 1);
        assert_eq!(waiter.join().unwrap(), WaitResult::Woken);
    }
}
