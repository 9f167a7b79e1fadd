// Benchmarks for lock acquire/release round trips
// Measures protocol overhead against the in-process store

use criterion::{Criterion, criterion_group, criterion_main};
use keyward_common::SystemClock;
use keyward_lock::{AcquireLock, AtomicNxLock, LockKey, NaiveLock, OwnedLock};
use keyward_store::MemoryStore;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_atomic_acquire_release(c: &mut Criterion) {
    let rt = runtime();
    let lock = AtomicNxLock::new(Arc::new(MemoryStore::new()));
    let key = LockKey::new("bench").unwrap();

    c.bench_function("atomic_acquire_release", |b| {
        b.to_async(&rt).iter(|| async {
            let token = lock.try_acquire(&key, Duration::from_secs(30)).await.unwrap();
            lock.release(&key, black_box(&token)).await.unwrap();
        })
    });
}

fn bench_atomic_contended_acquire(c: &mut Criterion) {
    let rt = runtime();
    let lock = AtomicNxLock::new(Arc::new(MemoryStore::new()));
    let key = LockKey::new("bench").unwrap();
    rt.block_on(lock.try_acquire(&key, Duration::from_secs(3600)))
        .unwrap();

    c.bench_function("atomic_contended_acquire", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(lock.try_acquire(&key, Duration::from_secs(30)).await.is_err())
        })
    });
}

fn bench_naive_acquire(c: &mut Criterion) {
    let rt = runtime();
    let store = Arc::new(MemoryStore::new());
    let lock = NaiveLock::new(store.clone(), Arc::new(SystemClock));

    c.bench_function("naive_acquire", |b| {
        b.iter_batched(
            || {
                store.force_delete("bench");
                LockKey::new("bench").unwrap()
            },
            |key| rt.block_on(lock.try_acquire(&key, Duration::from_secs(30))),
            criterion::BatchSize::PerIteration,
        )
    });
}

criterion_group!(
    benches,
    bench_atomic_acquire_release,
    bench_atomic_contended_acquire,
    bench_naive_acquire
);
criterion_main!(benches);
