//! # `spool` - Lock-Free Queue Toolkit
//!
//! Fixed-capacity, array-backed queues for moving values between threads
//! without a mutex, plus one conventional collaborator (a string-interning
//! pool). Three independent cores, each encoding a distinct concurrency
//! contract:
//!
//! - [`RingQueue`]: a bounded ring whose two ends advance by
//!   compare-and-swap. One producer, any number of consumers
//!   (`dequeue`/`steal`).
//! - [`spsc`]: a growable single-producer single-consumer ring. The hot
//!   path is wait-free; the producer doubles the buffer when it fills.
//! - [`worklist`]: a fixed-capacity Chase-Lev work-stealing deque. One
//!   owner pushes and pops at the tail, any number of stealers take from
//!   the head.
//!
//! ## Safety Guarantees
//!
//! ### Memory Safety
//! - **Audited unsafe core**: slot accesses are raw, but every one is
//!   guarded by the index protocol that hands slot ownership between
//!   threads; each element's destructor runs exactly once.
//! - **Role discipline in the types**: where a structure admits exactly one
//!   thread per role, construction returns split endpoints
//!   (producer/consumer, owner/stealer) whose mutating operations take
//!   `&mut self`, so a second thread in the same role is a compile error
//!   rather than a data race.
//!
//! ### Concurrency Safety
//! - **No blocking primitives**: every queue operation completes in a
//!   bounded number of steps; the only retries are the CAS spins that
//!   resolve races on the shared ends.
//! - **Memory barriers**: acquire/release pairs publish slot writes through
//!   the indices; the deque's pop/steal race is arbitrated with the
//!   sequentially consistent fences the published algorithm requires.
//!
//! ## Example
//!
//! ```rust
//! use spool::RingQueue;
//!
//! let queue = RingQueue::new(8);
//! assert!(queue.enqueue(1).is_ok());
//! assert!(queue.enqueue(2).is_ok());
//! assert_eq!(queue.dequeue(), Some(1));
//! assert_eq!(queue.dequeue(), Some(2));
//! assert_eq!(queue.dequeue(), None);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod intern;
pub mod ring;
pub mod spsc;
pub mod worklist;

pub use intern::{fnv1a, StrRef, StringPool};
pub use ring::RingQueue;
pub use worklist::Handle;

// Compile-time layout checks for the atomic-slot contract.
const _: () = {
    use core::mem;

    // `worklist` slots hold handle bits in a `usize`; the provided `Handle`
    // implementations must fit exactly.
    assert!(mem::size_of::<*mut ()>() == mem::size_of::<usize>());
    assert!(mem::size_of::<*const ()>() == mem::size_of::<usize>());

    // The deque's indices are 64-bit signed counters.
    assert!(mem::size_of::<core::sync::atomic::AtomicI64>() == 8);
};
