use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;

use herdsync::{
    cache::store::CacheStore,
    doc::Document,
    queue::{MemoryStore, ops::OperationQueue},
    types::OpKind,
};

fn herd_rows(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| Document::new(format!("a{i}"), json!({"tag": i, "status": "healthy"})))
        .collect()
}

fn bench_apply_rollback(c: &mut Criterion) {
    c.bench_function("cache_apply_rollback_10k", |b| {
        b.iter(|| {
            let mut cache = CacheStore::new();
            cache.merge_snapshot("animals:farm1", herd_rows(100));
            for _ in 0..10_000 {
                let record = cache.apply_optimistic("animals:farm1", |rows, temp_id| {
                    rows.push(Document::new(temp_id.clone(), json!({"status": "new"})));
                });
                cache.rollback(&record);
            }
        });
    });
}

fn bench_merge_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_snapshot");
    for n in [100usize, 1000usize] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut cache = CacheStore::new();
            cache.merge_snapshot("animals:farm1", herd_rows(n));
            let _record = cache.apply_optimistic("animals:farm1", |rows, temp_id| {
                rows.push(Document::new(temp_id.clone(), json!({"status": "new"})));
            });
            b.iter(|| {
                cache.merge_snapshot("animals:farm1", herd_rows(n));
            });
        });
    }
    group.finish();
}

fn bench_queue_write_through(c: &mut Criterion) {
    c.bench_function("queue_enqueue_1k", |b| {
        b.iter(|| {
            let mut queue = OperationQueue::new(Box::new(MemoryStore::new()));
            for i in 0..1_000u32 {
                let _ = queue
                    .enqueue(OpKind::Create, "animals:farm1", json!({"tag": i}))
                    .expect("enqueue");
            }
        });
    });
}

criterion_group!(
    benches,
    bench_apply_rollback,
    bench_merge_snapshot,
    bench_queue_write_through
);
criterion_main!(benches);
