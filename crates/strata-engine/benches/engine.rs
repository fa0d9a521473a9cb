//! Engine benchmarks.
//!
//! Benchmarks for:
//! - Record inserts under one transaction
//! - Point reads of committed records
//! - B+-tree inserts in random key order

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use strata_engine::{Engine, EngineConfig, IsolationLevel, Uid};

fn fresh_engine() -> (TempDir, Engine) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = EngineConfig::new(dir.path().join("bench"))
        .with_memory_bytes(16 * 1024 * 1024)
        .with_sync_writes(false);
    let engine = Engine::create(config).expect("Failed to create engine");
    (dir, engine)
}

fn random_payload(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.gen()).collect()
}

/// Benchmark inserts of varying record sizes.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/insert");
    let mut rng = StdRng::seed_from_u64(42);

    for size in [64usize, 512, 4096] {
        let payload = random_payload(&mut rng, size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            let (_dir, engine) = fresh_engine();
            let xid = engine
                .begin(IsolationLevel::ReadCommitted)
                .expect("begin failed");
            b.iter(|| black_box(engine.insert(xid, payload).expect("insert failed")));
            engine.commit(xid).expect("commit failed");
            engine.close().expect("close failed");
        });
    }

    group.finish();
}

/// Benchmark point reads under both isolation levels.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/read");
    let mut rng = StdRng::seed_from_u64(42);

    let (_dir, engine) = fresh_engine();
    let xid = engine
        .begin(IsolationLevel::ReadCommitted)
        .expect("begin failed");
    let uids: Vec<Uid> = (0..1000)
        .map(|_| {
            let payload = random_payload(&mut rng, 128);
            engine.insert(xid, &payload).expect("insert failed")
        })
        .collect();
    engine.commit(xid).expect("commit failed");

    for level in [IsolationLevel::ReadCommitted, IsolationLevel::RepeatableRead] {
        group.bench_function(BenchmarkId::from_parameter(level), |b| {
            let reader = engine.begin(level).expect("begin failed");
            b.iter(|| {
                let uid = uids[rng.gen_range(0..uids.len())];
                black_box(engine.read(reader, uid).expect("read failed"))
            });
            engine.commit(reader).expect("commit failed");
        });
    }

    group.finish();
    engine.close().expect("close failed");
}

/// Benchmark building an index from shuffled keys.
fn bench_index_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/index_insert");

    for count in [1_000u64, 10_000] {
        let mut keys: Vec<u64> = (0..count).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(7));

        group.throughput(Throughput::Elements(count));
        group.sample_size(10);
        group.bench_with_input(BenchmarkId::from_parameter(count), &keys, |b, keys| {
            b.iter(|| {
                let (_dir, engine) = fresh_engine();
                let boot = engine.create_index().expect("create_index failed");
                let tree = engine.load_index(boot).expect("load_index failed");
                for &key in keys {
                    tree.insert(key, Uid::from_raw(key + 1))
                        .expect("index insert failed");
                }
                tree.close().expect("tree close failed");
                engine.close().expect("close failed");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_read, bench_index_insert);
criterion_main!(benches);
