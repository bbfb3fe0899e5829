use criterion::{criterion_group, criterion_main, Criterion};
use std::thread;
use std::time::{Duration, Instant};

fn benchmark_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_queue");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("enqueue_dequeue", |b| {
        let queue = spool::RingQueue::new(1024);
        b.iter(|| {
            let _ = queue.enqueue(1_u64);
            queue.dequeue()
        });
    });

    group.bench_function("spsc_threaded", |b| {
        b.iter_custom(|iters| {
            let queue = spool::RingQueue::new(1024);
            let start = Instant::now();
            thread::scope(|s| {
                s.spawn(|| {
                    for i in 0..iters {
                        while queue.enqueue(i).is_err() {
                            std::hint::spin_loop();
                        }
                    }
                });
                s.spawn(|| {
                    for _ in 0..iters {
                        while queue.dequeue().is_none() {
                            std::hint::spin_loop();
                        }
                    }
                });
            });
            start.elapsed()
        });
    });

    group.finish();
}

fn benchmark_spsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_queue");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("enqueue_dequeue", |b| {
        let (mut tx, mut rx) = spool::spsc::queue::<u64>(1024);
        b.iter(|| {
            tx.enqueue(1);
            rx.dequeue()
        });
    });

    group.bench_function("threaded_with_growth", |b| {
        b.iter_custom(|iters| {
            // Small initial ring so the run includes growth events.
            let (mut tx, mut rx) = spool::spsc::queue::<u64>(16);
            let start = Instant::now();
            thread::scope(|s| {
                s.spawn(move || {
                    for i in 0..iters {
                        // Backpressure keeps the ring from growing without
                        // bound when the consumer falls behind.
                        while tx.len() >= 64 * 1024 {
                            std::hint::spin_loop();
                        }
                        tx.enqueue(i);
                    }
                });
                s.spawn(move || {
                    for _ in 0..iters {
                        while rx.dequeue().is_none() {
                            std::hint::spin_loop();
                        }
                    }
                });
            });
            start.elapsed()
        });
    });

    group.finish();
}

fn benchmark_worklist(c: &mut Criterion) {
    let mut group = c.benchmark_group("steal_deque");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("push_pop", |b| {
        let (mut owner, _stealer) = spool::worklist::deque::<usize>(1024);
        b.iter(|| {
            owner.try_push(1);
            owner.pop()
        });
    });

    group.bench_function("push_steal_threaded", |b| {
        b.iter_custom(|iters| {
            let (mut owner, stealer) = spool::worklist::deque::<usize>(1024);
            let start = Instant::now();
            thread::scope(|s| {
                let counting = (0..2).map(|_| {
                    let stealer = stealer.clone();
                    s.spawn(move || {
                        let mut taken = 0_u64;
                        loop {
                            match stealer.steal() {
                                Some(usize::MAX) => break,
                                Some(_) => taken += 1,
                                None => std::hint::spin_loop(),
                            }
                        }
                        taken
                    })
                });
                let thieves: Vec<_> = counting.collect();

                for i in 0..iters as usize {
                    while !owner.try_push(i) {
                        std::hint::spin_loop();
                    }
                }
                // One poison pill per thief ends its loop.
                for _ in 0..thieves.len() {
                    while !owner.try_push(usize::MAX) {
                        std::hint::spin_loop();
                    }
                }
                for handle in thieves {
                    handle.join().unwrap();
                }
            });
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_ring,
    benchmark_spsc,
    benchmark_worklist
);
criterion_main!(benches);
