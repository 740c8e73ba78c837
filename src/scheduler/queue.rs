//! Work-stealing queue implementation
//!
//! A bounded Chase-Lev deque. The owning worker pushes and pops at the
//! bottom; any number of thieves take from the top. Items live at logical
//! indices `[top, bottom)`, stored in slot `index & (capacity - 1)`.
//!
//! The owner handle ([`WorkStealingQueue`]) is `Send` but not `Sync`, so
//! `push` and `pop` can never run on two threads at once. Thieves use
//! cloneable [`Stealer`] handles.

use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};

/// Both indices start at 1 so index 0 never means "empty".
const INITIAL_INDEX: usize = 1;

struct Slot<T>(UnsafeCell<MaybeUninit<T>>);

impl<T> Slot<T> {
    fn empty() -> Self {
        Slot(UnsafeCell::new(MaybeUninit::uninit()))
    }

    /// # Safety
    /// Only the owner may write, and only at a slot outside `[top, bottom)`.
    unsafe fn write(&self, item: T) {
        ptr::write_volatile(self.0.get(), MaybeUninit::new(item));
    }

    /// Bitwise copy of the slot. The copy only becomes an owned `T` once the
    /// caller has claimed the index; otherwise it must be discarded unread.
    ///
    /// # Safety
    /// The slot must lie inside the buffer's allocated range.
    unsafe fn read(&self) -> MaybeUninit<T> {
        ptr::read_volatile(self.0.get())
    }
}

struct Inner<T> {
    /// Owner end. Only the owner stores to it.
    bottom: CachePadded<AtomicUsize>,
    /// Thief end. Advanced by thieves, and by the owner when it wins the
    /// race for the last item.
    top: CachePadded<AtomicUsize>,
    buffer: OnceCell<Box<[Slot<T>]>>,
}

// Slots are handed between threads only through the index protocol below.
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            bottom: CachePadded::new(AtomicUsize::new(INITIAL_INDEX)),
            top: CachePadded::new(AtomicUsize::new(INITIAL_INDEX)),
            buffer: OnceCell::new(),
        }
    }

    fn slots(&self) -> &[Slot<T>] {
        match self.buffer.get() {
            Some(buffer) => &buffer[..],
            None => &[],
        }
    }

    fn capacity(&self) -> usize {
        self.slots().len()
    }

    fn steal(&self) -> Option<T> {
        let mut t = self.top.load(Ordering::Acquire);
        let b = self.bottom.load(Ordering::Acquire);
        if t >= b {
            // False negatives are fine; the thief retries or moves on.
            return None;
        }

        let slots = self.slots();
        debug_assert!(!slots.is_empty(), "items visible in an uninitialized queue");
        let mask = slots.len() - 1;
        loop {
            // Pairs with the fence in `pop` so a concurrent decrement of
            // `bottom` is visible before we try to claim the last item.
            fence(Ordering::SeqCst);
            let b = self.bottom.load(Ordering::Acquire);
            if t >= b {
                return None;
            }
            // SAFETY: `t & mask` is in bounds. The copy is only used if the
            // CAS below claims index `t`.
            let item = unsafe { slots[t & mask].read() };
            match self
                .top
                .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            {
                // SAFETY: index `t` was published by a release store of
                // `bottom` and is now exclusively ours.
                Ok(_) => return Some(unsafe { item.assume_init() }),
                Err(current) => t = current,
            }
        }
    }

    fn volatile_size(&self) -> usize {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Relaxed);
        b.saturating_sub(t)
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let top = *self.top.get_mut();
        let bottom = *self.bottom.get_mut();
        if let Some(buffer) = self.buffer.get_mut() {
            let mask = buffer.len() - 1;
            for index in top..bottom {
                // SAFETY: every index in `[top, bottom)` holds an item that
                // was pushed and never handed out.
                unsafe { buffer[index & mask].0.get_mut().assume_init_drop() };
            }
        }
    }
}

/// Owner handle of a bounded work-stealing queue
pub struct WorkStealingQueue<T> {
    inner: Arc<Inner<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> WorkStealingQueue<T> {
    /// Create an empty queue without storage. Call [`init`](Self::init)
    /// before pushing; until then every push reports a full queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
            _not_sync: PhantomData,
        }
    }

    /// Create a queue and allocate `capacity` slots in one step
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut queue = Self::new();
        queue.init(capacity)?;
        Ok(queue)
    }

    /// Allocate the backing buffer. `capacity` must be a non-zero power of
    /// two, and a queue can be initialized only once.
    pub fn init(&mut self, capacity: usize) -> Result<()> {
        if self.inner.buffer.get().is_some() {
            log::error!("Work-stealing queue is already initialized");
            return Err(Error::AlreadyInitialized);
        }
        if !capacity.is_power_of_two() {
            log::error!(
                "Invalid capacity={} which must be a non-zero power of 2",
                capacity
            );
            return Err(Error::InvalidCapacity { capacity });
        }

        let mut slots = Vec::new();
        if slots.try_reserve_exact(capacity).is_err() {
            log::error!("Failed to allocate {} queue slots", capacity);
            return Err(Error::AllocationFailed { capacity });
        }
        slots.extend((0..capacity).map(|_| Slot::empty()));

        self.inner
            .buffer
            .set(slots.into_boxed_slice())
            .map_err(|_| Error::AlreadyInitialized)
    }

    /// Push an item at the bottom.
    ///
    /// Hands the item back if the queue is full. May run in parallel with
    /// `steal`.
    pub fn push(&self, item: T) -> std::result::Result<(), T> {
        let inner = &*self.inner;
        let slots = inner.slots();
        let capacity = slots.len();

        let b = inner.bottom.load(Ordering::Relaxed);
        let t = inner.top.load(Ordering::Acquire);
        if b >= t + capacity {
            return Err(item);
        }
        // SAFETY: `b` is outside `[t, b)` and no thief reads it until the
        // store below publishes it.
        unsafe { slots[b & (capacity - 1)].write(item) };
        inner.bottom.store(b + 1, Ordering::Release);
        Ok(())
    }

    /// Pop the most recently pushed item. May race with `steal`.
    pub fn pop(&self) -> Option<T> {
        let inner = &*self.inner;
        let b = inner.bottom.load(Ordering::Relaxed);
        let t = inner.top.load(Ordering::Relaxed);
        if t >= b {
            // A stale `top` is never larger than the real one, so this
            // fast check cannot hide an item from the owner.
            return None;
        }

        // Reserve index `newb` before looking at `top` again; the fence makes
        // the reservation visible to every thief that reads `top` after it.
        let newb = b - 1;
        inner.bottom.store(newb, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let t = inner.top.load(Ordering::Relaxed);
        if t > newb {
            inner.bottom.store(b, Ordering::Relaxed);
            return None;
        }

        let slots = inner.slots();
        // SAFETY: `newb` is in `[t, b)`; ownership is settled below.
        let item = unsafe { slots[newb & (slots.len() - 1)].read() };
        if t != newb {
            // SAFETY: more than one item was left, thieves cannot reach `newb`.
            return Some(unsafe { item.assume_init() });
        }

        // Single last item: whoever moves `top` first owns it.
        let popped = inner
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok();
        inner.bottom.store(b, Ordering::Relaxed);
        if popped {
            // SAFETY: the CAS claimed index `newb` for this thread.
            Some(unsafe { item.assume_init() })
        } else {
            None
        }
    }

    /// Take the oldest item, exactly as a thief would
    pub fn steal(&self) -> Option<T> {
        self.inner.steal()
    }

    /// Create a handle other threads can steal through
    pub fn stealer(&self) -> Stealer<T> {
        Stealer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Approximate number of queued items. Racy; for diagnostics only.
    pub fn volatile_size(&self) -> usize {
        self.inner.volatile_size()
    }

    /// Number of slots fixed by `init`, 0 before that
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Whether the queue looked empty at the time of the call
    pub fn is_empty(&self) -> bool {
        self.volatile_size() == 0
    }
}

impl<T> Default for WorkStealingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WorkStealingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkStealingQueue")
            .field("capacity", &self.capacity())
            .field("volatile_size", &self.volatile_size())
            .finish()
    }
}

/// Thief handle of a [`WorkStealingQueue`]
pub struct Stealer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Stealer<T> {
    /// Steal the oldest item.
    ///
    /// `None` means the queue looked empty; under contention it can be a
    /// false negative. May run in parallel with `push`, `pop` and other
    /// steals.
    pub fn steal(&self) -> Option<T> {
        self.inner.steal()
    }

    /// Approximate number of queued items. Racy; for diagnostics only.
    pub fn volatile_size(&self) -> usize {
        self.inner.volatile_size()
    }

    /// Capacity of the underlying queue
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Whether the queue looked empty at the time of the call
    pub fn is_empty(&self) -> bool {
        self.volatile_size() == 0
    }
}

impl<T> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Stealer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stealer")
            .field("capacity", &self.capacity())
            .field("volatile_size", &self.volatile_size())
            .finish()
    }
}
