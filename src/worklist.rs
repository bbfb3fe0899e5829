//! A fixed-capacity Chase–Lev work-stealing deque.
//!
//! One owner thread pushes and pops at the tail end (LIFO from its point of
//! view); any number of stealer threads take from the head end (roughly
//! FIFO). The protocol follows "Correct and Efficient Work-Stealing for
//! Weak Memory Models" (Lê et al., PPoPP '13): `head` and `tail` are
//! monotonically increasing 64-bit signed counters, masked only when
//! indexing the power-of-two buffer, so `head <= tail` holds for the life
//! of the deque and full/empty are never ambiguous.
//!
//! Items live in atomic slots, which is why they are restricted to
//! pointer-sized copyable handles (see [`Handle`]): the slot itself needs
//! no synchronization beyond the indices. Larger payloads travel as a
//! pointer or an index into caller-owned storage.
//!
//! Both `pop` and `steal` return `None` for "empty" as well as "lost the
//! race"; callers that need to distinguish the two retry or consult
//! [`len`](Owner::len) themselves.

use core::marker::PhantomData;
use core::sync::atomic::{fence, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// A value small enough to live in one atomic slot.
///
/// # Safety
/// `from_raw(into_raw(x))` must reproduce `x` exactly for every value the
/// caller pushes; the raw form must carry the complete value (no external
/// state). Implementations for types wider than `usize` are unsound.
pub unsafe trait Handle: Copy {
    /// Converts the value into its raw slot representation.
    fn into_raw(self) -> usize;
    /// Rebuilds a value previously converted with
    /// [`into_raw`](Self::into_raw).
    ///
    /// # Safety
    /// `raw` must have been produced by `into_raw` on this type.
    unsafe fn from_raw(raw: usize) -> Self;
}

// SAFETY: identity round-trip.
unsafe impl Handle for usize {
    #[inline]
    fn into_raw(self) -> usize {
        self
    }
    #[inline]
    unsafe fn from_raw(raw: usize) -> Self {
        raw
    }
}

// SAFETY: pointers are address-sized; the cast round-trips.
unsafe impl<T> Handle for *mut T {
    #[inline]
    fn into_raw(self) -> usize {
        self as usize
    }
    #[inline]
    unsafe fn from_raw(raw: usize) -> Self {
        raw as *mut T
    }
}

// SAFETY: pointers are address-sized; the cast round-trips.
unsafe impl<T> Handle for *const T {
    #[inline]
    fn into_raw(self) -> usize {
        self as usize
    }
    #[inline]
    unsafe fn from_raw(raw: usize) -> Self {
        raw as *const T
    }
}

struct Inner<T> {
    /// Next slot to steal. Advanced by CAS from stealers and, for the last
    /// element, from the owner's pop.
    head: CachePadded<AtomicI64>,
    /// Next slot the owner writes. The owner is the only writer.
    tail: CachePadded<AtomicI64>,
    buffer: Box<[AtomicUsize]>,
    mask: i64,
    _marker: PhantomData<T>,
}

impl<T> Inner<T> {
    #[inline]
    fn slot(&self, index: i64) -> &AtomicUsize {
        &self.buffer[(index & self.mask) as usize]
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        // A speculative pop may leave `tail` one below `head` for a moment.
        if tail > head {
            (tail - head) as usize
        } else {
            0
        }
    }

    fn capacity(&self) -> usize {
        self.buffer.len() - 1
    }
}

/// Creates a work-stealing deque backed by `capacity` slots and splits it
/// into the owner endpoint and a clonable stealer endpoint.
///
/// The usable capacity is `capacity - 1`.
///
/// # Panics
/// Panics if `capacity` is not a power of two or is less than 2.
pub fn deque<T: Handle>(capacity: usize) -> (Owner<T>, Stealer<T>) {
    assert!(
        capacity.is_power_of_two() && capacity >= 2,
        "capacity must be a power of two, at least 2"
    );
    let mut buffer = Vec::with_capacity(capacity);
    for _ in 0..capacity {
        buffer.push(AtomicUsize::new(0));
    }
    let inner = Arc::new(Inner {
        head: CachePadded::new(AtomicI64::new(0)),
        tail: CachePadded::new(AtomicI64::new(0)),
        buffer: buffer.into_boxed_slice(),
        mask: capacity as i64 - 1,
        _marker: PhantomData,
    });
    (
        Owner {
            inner: Arc::clone(&inner),
        },
        Stealer { inner },
    )
}

/// The owning end of the deque: pushes and pops at the tail.
///
/// Not clonable; move it to the one thread that runs the work loop.
pub struct Owner<T: Handle> {
    inner: Arc<Inner<T>>,
}

/// A stealing end of the deque: takes from the head. Clone freely.
pub struct Stealer<T: Handle> {
    inner: Arc<Inner<T>>,
}

// SAFETY: items are plain data by the `Handle` contract; the indices hand
// slot ownership across threads. `T: Send` gates handles that carry
// thread-affine payloads behind a caller-written wrapper.
unsafe impl<T: Handle + Send> Send for Owner<T> {}
unsafe impl<T: Handle + Send> Sync for Owner<T> {}
unsafe impl<T: Handle + Send> Send for Stealer<T> {}
unsafe impl<T: Handle + Send> Sync for Stealer<T> {}

impl<T: Handle> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Handle> Owner<T> {
    /// Attempts to push `item` at the tail.
    ///
    /// Returns `false` if the deque is full.
    pub fn try_push(&mut self, item: T) -> bool {
        let inner = &*self.inner;
        let tail = inner.tail.load(Ordering::Relaxed);
        let head = inner.head.load(Ordering::Acquire);
        if tail - head >= inner.mask {
            return false;
        }
        inner.slot(tail).store(item.into_raw(), Ordering::Relaxed);
        // Publish the slot before making it stealable via `tail`.
        fence(Ordering::Release);
        inner.tail.store(tail + 1, Ordering::Release);
        true
    }

    /// Pushes `item` at the tail, invoking `on_full` instead of inserting
    /// if the deque is full.
    pub fn push<F: FnOnce()>(&mut self, item: T, on_full: F) {
        if !self.try_push(item) {
            on_full();
        }
    }

    /// Pops the most recently pushed item still present, or `None` if the
    /// deque is empty or the last item was stolen first.
    pub fn pop(&mut self) -> Option<T> {
        let inner = &*self.inner;
        // Claim the slot speculatively before looking at `head`.
        let tail = inner.tail.load(Ordering::Relaxed) - 1;
        inner.tail.store(tail, Ordering::Relaxed);
        fence(Ordering::SeqCst);
        let head = inner.head.load(Ordering::Relaxed);

        if head <= tail {
            let raw = inner.slot(tail).load(Ordering::Relaxed);
            // SAFETY: every stored value came from `into_raw`.
            let mut item = Some(unsafe { T::from_raw(raw) });
            if head == tail {
                // One element left: win the race against the stealers or
                // concede it.
                if inner
                    .head
                    .compare_exchange(head, head + 1, Ordering::SeqCst, Ordering::Relaxed)
                    .is_err()
                {
                    item = None;
                }
                inner.tail.store(tail + 1, Ordering::Relaxed);
            }
            item
        } else {
            // Deque was already empty; undo the claim.
            inner.tail.store(tail + 1, Ordering::Relaxed);
            None
        }
    }

    /// Number of items present at the time of the call.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the deque held no items at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// The number of items the deque can hold, one less than the buffer
    /// length.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<T: Handle> Stealer<T> {
    /// Takes the oldest item. Returns `None` when the deque is empty and
    /// also when another stealer or the owner's pop won the race: a single
    /// attempt, no internal retry.
    pub fn steal(&self) -> Option<T> {
        let inner = &*self.inner;
        let head = inner.head.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let tail = inner.tail.load(Ordering::Acquire);
        if head < tail {
            let raw = inner.slot(head).load(Ordering::Relaxed);
            if inner
                .head
                .compare_exchange(head, head + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_err()
            {
                return None;
            }
            // SAFETY: every stored value came from `into_raw`.
            Some(unsafe { T::from_raw(raw) })
        } else {
            None
        }
    }

    /// Number of items present at the time of the call.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the deque held no items at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// The number of items the deque can hold, one less than the buffer
    /// length.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}
