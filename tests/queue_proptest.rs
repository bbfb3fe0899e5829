//! Model-based checks: each queue against a `VecDeque` over arbitrary
//! single-threaded operation sequences.

use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Clone, Debug)]
enum Op {
    Enqueue(u32),
    Dequeue,
}

fn ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![any::<u32>().prop_map(Op::Enqueue), Just(Op::Dequeue)],
        1..max_len,
    )
}

proptest! {
    #[test]
    fn ring_queue_matches_model(ops in ops(256)) {
        let queue = spool::RingQueue::new(16);
        let mut model: VecDeque<u32> = VecDeque::new();

        for op in ops {
            match op {
                Op::Enqueue(v) => {
                    if model.len() < queue.capacity() {
                        prop_assert!(queue.enqueue(v).is_ok());
                        model.push_back(v);
                    } else {
                        prop_assert_eq!(queue.enqueue(v), Err(v));
                    }
                }
                Op::Dequeue => {
                    prop_assert_eq!(queue.dequeue(), model.pop_front());
                }
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.is_empty(), model.is_empty());
            prop_assert_eq!(queue.is_full(), model.len() == queue.capacity());
        }
    }

    #[test]
    fn spsc_queue_matches_model(ops in ops(512)) {
        let (mut tx, mut rx) = spool::spsc::queue(4);
        let mut model: VecDeque<u32> = VecDeque::new();

        for op in ops {
            match op {
                Op::Enqueue(v) => {
                    tx.enqueue(v);
                    model.push_back(v);
                }
                Op::Dequeue => {
                    prop_assert_eq!(rx.dequeue(), model.pop_front());
                }
            }
            prop_assert_eq!(rx.len(), model.len());
            prop_assert_eq!(rx.peek().copied(), model.front().copied());
        }

        // Drain to confirm nothing was reordered by growth.
        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(rx.dequeue(), Some(expected));
        }
        prop_assert_eq!(rx.dequeue(), None);
    }

    #[test]
    fn steal_deque_pop_matches_stack_model(values in proptest::collection::vec(any::<usize>(), 1..64)) {
        let (mut owner, _stealer) = spool::worklist::deque::<usize>(64);
        let mut model: Vec<usize> = Vec::new();

        for v in values {
            prop_assert!(owner.try_push(v));
            model.push(v);
        }
        while let Some(expected) = model.pop() {
            prop_assert_eq!(owner.pop(), Some(expected));
        }
        prop_assert_eq!(owner.pop(), None);
    }
}
