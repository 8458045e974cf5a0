use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use std::time::Duration;

use chrono::Utc;
use docflow_core::{DocumentId, JobId, JobStatusRecord, PrincipalKey};
use docflow_infra::{InMemoryKeyValueStore, JobStatusStore, KeyValueStore, LockManager};

const TTL: Duration = Duration::from_secs(600);

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime")
}

fn bench_lock_cycle(c: &mut Criterion) {
    let rt = rt();
    let locks = LockManager::new(InMemoryKeyValueStore::arc());
    let principal = PrincipalKey::new("bench@x.com").unwrap();

    let mut group = c.benchmark_group("lock");
    group.throughput(Throughput::Elements(1));
    group.bench_function("acquire_release_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let acquired = locks
                    .acquire("document-processing", &principal, TTL)
                    .await
                    .unwrap();
                black_box(acquired);
                locks.release("document-processing", &principal).await.unwrap();
            })
        })
    });
    group.finish();
}

fn bench_contended_acquire(c: &mut Criterion) {
    let rt = rt();
    let locks = LockManager::new(InMemoryKeyValueStore::arc());
    let principal = PrincipalKey::new("bench@x.com").unwrap();

    rt.block_on(async {
        locks
            .acquire("document-processing", &principal, TTL)
            .await
            .unwrap();
    });

    // Held lock: every acquire attempt loses the create-if-absent race.
    c.bench_function("lock/contended_acquire", |b| {
        b.iter(|| {
            rt.block_on(async {
                let acquired = locks
                    .acquire("document-processing", &principal, TTL)
                    .await
                    .unwrap();
                black_box(acquired);
            })
        })
    });
}

fn bench_status_roundtrip(c: &mut Criterion) {
    let rt = rt();
    let statuses = JobStatusStore::new(InMemoryKeyValueStore::arc());
    let job_id = JobId::new("bench-job").unwrap();
    let record = JobStatusRecord::queued(DocumentId::new(), Utc::now());

    let mut group = c.benchmark_group("status");
    group.throughput(Throughput::Elements(1));
    group.bench_function("write_then_read", |b| {
        b.iter(|| {
            rt.block_on(async {
                statuses.write(&job_id, &record, TTL).await.unwrap();
                black_box(statuses.read(&job_id).await.unwrap());
            })
        })
    });
    group.finish();
}

fn bench_raw_kv(c: &mut Criterion) {
    let rt = rt();
    let store = InMemoryKeyValueStore::new();

    c.bench_function("kv/put_if_absent_fresh_keys", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("k-{i}");
            rt.block_on(async {
                black_box(store.put_if_absent(&key, "v", TTL).await.unwrap());
            })
        })
    });
}

criterion_group!(
    benches,
    bench_lock_cycle,
    bench_contended_acquire,
    bench_status_roundtrip,
    bench_raw_kv
);
criterion_main!(benches);
