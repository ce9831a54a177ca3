//! Performance benchmarks for the document store.

use channel_store::{ChannelId, DocumentStore, MemoryChannel, StoreConfig, Validator};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

const CHANNEL: ChannelId = ChannelId(-1);

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn create_store() -> DocumentStore {
    DocumentStore::new(Arc::new(MemoryChannel::new()), StoreConfig::new(CHANNEL))
}

/// Benchmark normalization and canonical encoding
fn bench_validate(c: &mut Criterion) {
    let validator = Validator::default();
    let text = r#"{"user": "alice", "plan": "pro", "credits": 120, "tags": ["a", "b"]}"#;

    c.bench_function("normalize_text", |b| {
        b.iter(|| black_box(validator.normalize_one(black_box(text), true).unwrap()));
    });

    let doc = validator.normalize_one(text, true).unwrap();
    c.bench_function("encode", |b| {
        b.iter(|| black_box(validator.encode(black_box(&doc)).unwrap()));
    });
}

/// Benchmark single inserts
fn bench_insert_one(c: &mut Criterion) {
    let rt = runtime();
    let store = create_store();

    c.bench_function("insert_one", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(store.insert_one(json!({"event": "click", "x": 10})).await.unwrap())
            })
        });
    });
}

/// Benchmark point lookups with a growing history
fn bench_get_one(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("get_one");

    for history_size in [100, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("history_records", history_size),
            &history_size,
            |b, &size| {
                let store = create_store();
                let target = rt.block_on(async {
                    for i in 0..size {
                        store.insert_one(json!({"seq": i})).await.unwrap();
                    }
                    store.insert_one(json!({"seq": "target"})).await.unwrap()
                });
                let id = target.id().unwrap_or_default().to_string();

                b.iter(|| {
                    rt.block_on(async {
                        black_box(store.get_one(json!({"_id": id.as_str()})).await)
                    })
                });
            },
        );
    }

    group.finish();
}

/// Benchmark batch updates
fn bench_update_many(c: &mut Criterion) {
    let rt = runtime();
    let store = create_store();
    rt.block_on(async {
        for i in 0..100 {
            store.insert_one(json!({"group": "g", "n": i})).await.unwrap();
        }
    });

    c.bench_function("update_many_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    store
                        .update_many(json!({"group": "g"}), json!({"touched": true}), None)
                        .await
                        .unwrap(),
                )
            })
        });
    });
}

criterion_group!(
    benches,
    bench_validate,
    bench_insert_one,
    bench_get_one,
    bench_update_many,
);

criterion_main!(benches);
