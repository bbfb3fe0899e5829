//! A bounded, array-backed queue guarded by compare-and-swap.
//!
//! The buffer is a power-of-two ring indexed through a mask. Two atomic
//! indices delimit the live window `[head, tail)`: `enqueue` writes at
//! `tail`, `dequeue`/`steal` read at `head`, and each end advances its index
//! with a CAS retry loop instead of taking a lock. One slot is always kept
//! empty to tell a full ring from an empty one, so the usable capacity is
//! one less than the buffer length.
//!
//! Concurrency contract: any number of threads may dequeue or steal
//! concurrently, but at most one thread may enqueue at a time. The producer
//! writes its slot *before* publishing it with the CAS on `tail`, so a
//! second racing producer could re-write a slot the winner already owns.

use core::cell::UnsafeCell;
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// A fixed-capacity lock-free queue for one producer and any number of
/// consumers.
pub struct RingQueue<T> {
    /// Index of the next slot to read.
    head: CachePadded<AtomicUsize>,
    /// Index of the next slot to write.
    tail: CachePadded<AtomicUsize>,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Buffer length minus one; maps an index to its physical slot.
    mask: usize,
}

// SAFETY: elements are handed from one thread to another, never shared;
// the indices synchronize slot ownership.
unsafe impl<T: Send> Send for RingQueue<T> {}
unsafe impl<T: Send> Sync for RingQueue<T> {}

impl<T> RingQueue<T> {
    /// Creates a queue backed by `capacity` slots.
    ///
    /// The usable capacity is `capacity - 1`.
    ///
    /// # Panics
    /// Panics if `capacity` is zero or not a power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "capacity must be a nonzero power of two"
        );
        let mut buffer = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buffer.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer: buffer.into_boxed_slice(),
            mask: capacity - 1,
        }
    }

    /// Attempts to insert `value` at the tail of the queue.
    ///
    /// Returns `Err(value)` without side effect if the queue is full.
    pub fn enqueue(&self, value: T) -> Result<(), T> {
        let value = ManuallyDrop::new(value);
        let mut tail = self.tail.load(Ordering::Acquire);
        loop {
            let next = (tail + 1) & self.mask;
            if next == self.head.load(Ordering::Acquire) {
                return Err(ManuallyDrop::into_inner(value));
            }
            // SAFETY: `tail` is masked, so the index is in bounds, and the
            // slot sits outside the live window. The write is published by
            // the releasing CAS below; a lost CAS leaves a dead bit-copy
            // that the retry overwrites.
            unsafe {
                (*self.buffer.get_unchecked(tail).get()).write(ptr::read(&*value));
            }
            match self
                .tail
                .compare_exchange_weak(tail, next, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(t) => tail = t,
            }
        }
    }

    /// Removes the oldest element, or returns `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            if head == self.tail.load(Ordering::Acquire) {
                return None;
            }
            // SAFETY: the window is non-empty, so slot `head` holds an
            // initialized element. The bit-copy read here is kept only when
            // the CAS claims the slot; a loser forgets its copy so the
            // element is dropped exactly once.
            let value = unsafe { (*self.buffer.get_unchecked(head).get()).assume_init_read() };
            let next = (head + 1) & self.mask;
            match self
                .head
                .compare_exchange_weak(head, next, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => return Some(value),
                Err(h) => {
                    mem::forget(value);
                    head = h;
                }
            }
        }
    }

    /// Removes the oldest element from a consumer other than the primary
    /// one.
    ///
    /// Identical to [`dequeue`](Self::dequeue); the separate name marks call
    /// sites where several threads drain the same queue concurrently.
    #[inline]
    pub fn steal(&self) -> Option<T> {
        self.dequeue()
    }

    /// Returns `true` if the queue held no elements at the time of the call.
    ///
    /// Like the other snapshots this is only a hint once other threads are
    /// involved; it may be stale by the time it returns.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Returns `true` if the queue was full at the time of the call.
    pub fn is_full(&self) -> bool {
        let tail = self.tail.load(Ordering::Acquire);
        ((tail + 1) & self.mask) == self.head.load(Ordering::Acquire)
    }

    /// Number of elements held at the time of the call.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).wrapping_add(self.mask + 1) & self.mask
    }

    /// The number of elements the queue can hold, one less than the buffer
    /// length.
    pub fn capacity(&self) -> usize {
        self.mask
    }
}

impl<T> Drop for RingQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
    }
}
