//! A growable single-producer single-consumer ring buffer.
//!
//! The hot path is wait-free: with one writer per index there is nothing to
//! retry, so `enqueue` and `dequeue` are a pair of loads, a slot access and
//! one releasing store each. When the ring is full the producer may double
//! the buffer in place; the consumer never allocates.
//!
//! The two roles are split into [`Producer`] and [`Consumer`] endpoints at
//! construction, which makes the one-thread-per-role discipline a
//! compile-time property rather than a documented convention.
//!
//! Indices are monotonic and unmasked; each buffer generation carries its
//! own mask. Growth bit-copies the live window into the doubled buffer and
//! publishes it through an atomic pointer, while the consumer orders its
//! buffer load after its `tail` load, so any generation it can observe
//! holds every element below the `tail` it saw. Superseded buffers are
//! parked until both endpoints are gone; the slots they still hold are
//! stale bit-copies and are never read or dropped as elements.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// One generation of backing storage.
struct Buffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Slot count minus one; maps a monotonic index to its physical slot.
    mask: usize,
}

impl<T> Buffer<T> {
    fn alloc(capacity: usize) -> *mut Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Box::into_raw(Box::new(Self {
            slots: slots.into_boxed_slice(),
            mask: capacity - 1,
        }))
    }

    /// # Safety
    /// The slot at `index & mask` must be outside the live window.
    unsafe fn write(&self, index: usize, value: T) {
        (*self.slots.get_unchecked(index & self.mask).get()).write(value);
    }

    /// # Safety
    /// The slot at `index & mask` must hold an initialized element in this
    /// generation. The caller takes ownership of the bit-copy.
    unsafe fn read(&self, index: usize) -> T {
        (*self.slots.get_unchecked(index & self.mask).get()).assume_init_read()
    }

    /// # Safety
    /// As for [`read`](Self::read), but ownership stays in the slot.
    unsafe fn slot(&self, index: usize) -> *const T {
        (*self.slots.get_unchecked(index & self.mask).get()).as_ptr()
    }
}

/// State shared by the two endpoints.
struct Inner<T> {
    /// Next index to read. Written only by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Next index to write. Written only by the producer.
    tail: CachePadded<AtomicUsize>,
    /// Current buffer generation. Replaced only by the producer.
    buffer: AtomicPtr<Buffer<T>>,
    /// Superseded generations, freed when the last endpoint drops. Pushed
    /// to only by the producer.
    retired: UnsafeCell<Vec<*mut Buffer<T>>>,
}

// SAFETY: slot ownership is handed over through the head/tail indices;
// `buffer` moves forward only under the producer, and `retired` is touched
// only by the producer thread and the final exclusive drop.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Inner<T> {
    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    fn capacity(&self) -> usize {
        // SAFETY: the pointer is always a live generation; retired buffers
        // outlive both endpoints.
        unsafe { (*self.buffer.load(Ordering::Acquire)).mask }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let current = *self.buffer.get_mut();
        let mut index = head;
        while index != tail {
            // SAFETY: `[head, tail)` of the current generation is exactly
            // the set of elements never moved out.
            unsafe { drop((*current).read(index)) };
            index = index.wrapping_add(1);
        }
        // SAFETY: both endpoints are gone; nothing aliases the buffers. The
        // retired generations hold only stale bit-copies, so only their
        // storage is released.
        unsafe {
            drop(Box::from_raw(current));
            for ptr in (*self.retired.get()).drain(..) {
                drop(Box::from_raw(ptr));
            }
        }
    }
}

/// Creates a growable SPSC queue backed by `capacity` slots and splits it
/// into its two endpoints.
///
/// The usable capacity is `capacity - 1`; it doubles whenever a growing
/// insert finds the ring full.
///
/// # Panics
/// Panics if `capacity` is zero or not a power of two.
pub fn queue<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(
        capacity.is_power_of_two(),
        "capacity must be a nonzero power of two"
    );
    let inner = Arc::new(Inner {
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
        buffer: AtomicPtr::new(Buffer::alloc(capacity)),
        retired: UnsafeCell::new(Vec::new()),
    });
    (
        Producer {
            inner: Arc::clone(&inner),
        },
        Consumer { inner },
    )
}

/// The writing half of the queue. Exactly one thread may hold it.
pub struct Producer<T> {
    inner: Arc<Inner<T>>,
}

/// The reading half of the queue. Exactly one thread may hold it.
pub struct Consumer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Producer<T> {
    /// Inserts `value` at the tail without ever growing the buffer.
    ///
    /// Returns `Err(value)` if the ring is full.
    pub fn try_enqueue(&mut self, value: T) -> Result<(), T> {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);
        let head = inner.head.load(Ordering::Acquire);
        // SAFETY: only this producer replaces the buffer.
        let buf = unsafe { &*inner.buffer.load(Ordering::Relaxed) };
        if tail.wrapping_sub(head) == buf.mask {
            return Err(value);
        }
        // SAFETY: the ring is not full, so slot `tail` is outside the live
        // window. The releasing store below publishes the write.
        unsafe { buf.write(tail, value) };
        inner.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Inserts `value` at the tail, doubling the buffer if the ring is
    /// full. Never fails short of allocation failure, which aborts.
    pub fn enqueue(&mut self, mut value: T) {
        loop {
            match self.try_enqueue(value) {
                Ok(()) => return,
                Err(rejected) => {
                    value = rejected;
                    self.grow();
                }
            }
        }
    }

    /// Constructs an element directly in its slot from `f`, doubling the
    /// buffer first if the ring is full.
    pub fn enqueue_with<F: FnOnce() -> T>(&mut self, f: F) {
        if self.remaining() == 0 {
            self.grow();
        }
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);
        // SAFETY: only this producer replaces the buffer, and the check
        // above guarantees a free slot (the consumer only ever frees more).
        let buf = unsafe { &*inner.buffer.load(Ordering::Relaxed) };
        unsafe { buf.write(tail, f()) };
        inner.tail.store(tail.wrapping_add(1), Ordering::Release);
    }

    /// Number of elements held at the time of the call.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the queue held no elements at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Returns `true` if a non-growing insert would currently fail.
    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    /// Current usable capacity, one less than the buffer length.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn remaining(&self) -> usize {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);
        let head = inner.head.load(Ordering::Acquire);
        // SAFETY: only this producer replaces the buffer.
        let mask = unsafe { (*inner.buffer.load(Ordering::Relaxed)).mask };
        mask - tail.wrapping_sub(head)
    }

    /// Replaces the current buffer with one of twice the capacity.
    fn grow(&mut self) {
        let inner = &*self.inner;
        let old_ptr = inner.buffer.load(Ordering::Relaxed);
        // SAFETY: only this producer replaces or retires buffers.
        let old = unsafe { &*old_ptr };
        let head = inner.head.load(Ordering::Acquire);
        let tail = inner.tail.load(Ordering::Relaxed);
        let new_capacity = (old.mask + 1) * 2;
        #[cfg(feature = "tracing")]
        tracing::trace!(
            capacity = new_capacity,
            live = tail.wrapping_sub(head),
            "growing spsc ring"
        );
        let new_ptr = Buffer::alloc(new_capacity);
        // SAFETY: freshly allocated, unshared until the store below.
        let new = unsafe { &*new_ptr };
        // Bit-copy the live window. Entries the consumer drains while this
        // runs become stale duplicates below `head` in the new generation;
        // nothing ever reads or drops them.
        let mut index = head;
        while index != tail {
            // SAFETY: `[head, tail)` is initialized in the old generation,
            // and nothing else writes either buffer during the copy.
            unsafe { new.write(index, old.read(index)) };
            index = index.wrapping_add(1);
        }
        inner.buffer.store(new_ptr, Ordering::Release);
        // The consumer may still be reading the old generation; park it
        // until both endpoints are gone.
        unsafe { (*inner.retired.get()).push(old_ptr) };
    }
}

impl<T> Consumer<T> {
    /// Removes and returns the oldest element, or `None` if the queue is
    /// empty. Never blocks.
    pub fn dequeue(&mut self) -> Option<T> {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Relaxed);
        let tail = inner.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // The buffer is loaded after `tail`: any generation published
        // before that load holds every element below the observed `tail`.
        let buf = unsafe { &*inner.buffer.load(Ordering::Acquire) };
        // SAFETY: `head < tail`, so the slot is initialized in this
        // generation; advancing `head` below hands the slot back.
        let value = unsafe { buf.read(head) };
        inner.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Borrows the oldest element without removing it.
    pub fn peek(&self) -> Option<&T> {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Relaxed);
        let tail = inner.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let buf = unsafe { &*inner.buffer.load(Ordering::Acquire) };
        // SAFETY: the slot stays initialized until this consumer advances
        // `head`, which the returned borrow prevents; the producer never
        // writes slots in the live window, and superseded generations stay
        // allocated while this endpoint exists.
        Some(unsafe { &*buf.slot(head) })
    }

    /// Removes and drops the oldest element. Returns `false` if the queue
    /// was empty.
    pub fn pop(&mut self) -> bool {
        self.dequeue().is_some()
    }

    /// Number of elements held at the time of the call.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the queue held no elements at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Returns `true` if the ring was full at the time of the call.
    pub fn is_full(&self) -> bool {
        self.inner.len() == self.inner.capacity()
    }

    /// Current usable capacity, one less than the buffer length.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
