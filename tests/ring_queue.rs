use spool::RingQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[test]
fn capacity_four_scenario() {
    let queue = RingQueue::new(4);
    assert!(queue.enqueue(1).is_ok());
    assert!(queue.enqueue(2).is_ok());
    assert!(queue.enqueue(3).is_ok());
    // One slot stays empty, so the usable capacity is 3.
    assert_eq!(queue.enqueue(4), Err(4));
    assert_eq!(queue.dequeue(), Some(1));
    assert_eq!(queue.dequeue(), Some(2));
    assert_eq!(queue.dequeue(), Some(3));
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn predicates_agree_with_len() {
    let queue = RingQueue::new(8);
    assert!(queue.is_empty());
    assert!(!queue.is_full());

    for i in 0..queue.capacity() {
        assert_eq!(queue.len(), i);
        assert!(queue.enqueue(i).is_ok());
        assert_eq!(queue.is_full(), queue.len() == queue.capacity());
        assert_eq!(queue.is_empty(), queue.len() == 0);
    }
    assert!(queue.is_full());

    while queue.dequeue().is_some() {
        assert_eq!(queue.is_full(), queue.len() == queue.capacity());
        assert_eq!(queue.is_empty(), queue.len() == 0);
    }
    assert!(queue.is_empty());
}

#[test]
fn spsc_preserves_order() {
    const ITEMS: u32 = 50_000;
    let queue = RingQueue::new(64);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..ITEMS {
                while queue.enqueue(i).is_err() {
                    thread::yield_now();
                }
            }
        });

        s.spawn(|| {
            for expected in 0..ITEMS {
                loop {
                    if let Some(v) = queue.dequeue() {
                        assert_eq!(v, expected);
                        break;
                    }
                    thread::yield_now();
                }
            }
        });
    });

    assert!(queue.is_empty());
}

#[test]
fn concurrent_stealers_take_each_item_once() {
    const ITEMS: usize = 20_000;
    let queue = RingQueue::new(128);
    let produced = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..ITEMS {
                while queue.enqueue(i).is_err() {
                    thread::yield_now();
                }
            }
            produced.store(true, Ordering::Release);
        });

        let stealers: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    let mut got = Vec::new();
                    loop {
                        if let Some(v) = queue.steal() {
                            got.push(v);
                        } else if produced.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        } else {
                            thread::yield_now();
                        }
                    }
                    got
                })
            })
            .collect();

        let mut seen = vec![false; ITEMS];
        for handle in stealers {
            for v in handle.join().unwrap() {
                assert!(v < ITEMS);
                assert!(!seen[v], "item {v} delivered twice");
                seen[v] = true;
            }
        }
        assert!(seen.iter().all(|&b| b), "some item was lost");
    });
}
