//! Work-stealing queue benchmarks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use routine_substrate::prelude::*;

fn bench_push_pop(c: &mut Criterion) {
    let queue = WorkStealingQueue::with_capacity(1024).unwrap();

    c.bench_function("queue_push_pop", |b| {
        b.iter(|| {
            queue.push(black_box(42usize)).unwrap();
            black_box(queue.pop());
        })
    });
}

fn bench_push_steal(c: &mut Criterion) {
    let queue = WorkStealingQueue::with_capacity(1024).unwrap();
    let stealer = queue.stealer();

    c.bench_function("queue_push_steal", |b| {
        b.iter(|| {
            queue.push(black_box(42usize)).unwrap();
            black_box(stealer.steal());
        })
    });
}

fn bench_pop_under_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_pop_with_thieves");

    for thieves in [1usize, 2, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(thieves), &thieves, |b, &thieves| {
            let queue = WorkStealingQueue::with_capacity(4096).unwrap();
            let stop = Arc::new(AtomicBool::new(false));
            let handles: Vec<_> = (0..thieves)
                .map(|_| {
                    let stealer = queue.stealer();
                    let stop = Arc::clone(&stop);
                    thread::spawn(move || {
                        while !stop.load(Ordering::Relaxed) {
                            black_box(stealer.steal());
                        }
                    })
                })
                .collect();

            b.iter(|| {
                for i in 0..64usize {
                    let _ = queue.push(i);
                }
                while queue.pop().is_some() {}
            });

            stop.store(true, Ordering::Relaxed);
            for handle in handles {
                handle.join().unwrap();
            }
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_push_pop,
    bench_push_steal,
    bench_pop_under_contention
);
criterion_main!(benches);
