//! Benchmarks for the reconciler

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tamago_core::{DeltaKind, Pet, PetKey, PetSpec, PetStatus, PendingDeltas};
use tamago_reconcile::{apply_deltas, decay_status, MemoryEmitter, Phase, Reconciler};
use tamago_store::{request_delta, MemoryStore, ObjectStore, RetryPolicy};

fn sample_pet() -> Pet {
    let mut pet = Pet::new(
        PetKey::named("mochi"),
        PetSpec::new("Mochi").with_decay_rates(3, 2),
    );
    pet.status = PetStatus {
        food: 60,
        love: 45,
        initialized: true,
        modified_time: Some(chrono::Utc::now() - chrono::Duration::seconds(5)),
        ..PetStatus::default()
    };
    pet
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_classify(c: &mut Criterion) {
    let pet = sample_pet();
    let now = chrono::Utc::now();

    c.bench_function("phase_classify", |b| {
        b.iter(|| Phase::classify(black_box(&pet), black_box(now)))
    });
}

fn bench_apply_deltas(c: &mut Criterion) {
    let pet = sample_pet();
    let deltas = PendingDeltas {
        food: Some(25),
        love: Some(-70),
    };
    let now = chrono::Utc::now();

    c.bench_function("apply_deltas", |b| {
        b.iter(|| apply_deltas(black_box(&pet.status), black_box(deltas), now))
    });
}

fn bench_decay(c: &mut Criterion) {
    let pet = sample_pet();
    let now = chrono::Utc::now();

    c.bench_function("decay_status", |b| {
        b.iter(|| decay_status(black_box(&pet.status), black_box(&pet.spec), now))
    });
}

fn bench_reconcile_quiescent(c: &mut Criterion) {
    let rt = runtime();
    let store = Arc::new(MemoryStore::new());
    let pet = rt.block_on(store.create(sample_pet())).unwrap();
    let reconciler = Reconciler::new(Arc::clone(&store), Arc::new(MemoryEmitter::new()));

    c.bench_function("reconcile_quiescent", |b| {
        b.iter(|| {
            let action = rt.block_on(reconciler.reconcile(black_box(&pet.key))).unwrap();
            black_box(action)
        })
    });
}

fn bench_reconcile_delta(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("reconcile_delta");

    for pets in [1usize, 16, 256] {
        let store = Arc::new(MemoryStore::new());
        for i in 0..pets {
            let mut pet = sample_pet();
            pet.key = PetKey::named(format!("pet-{i}"));
            rt.block_on(store.create(pet)).unwrap();
        }
        let reconciler = Reconciler::new(Arc::clone(&store), Arc::new(MemoryEmitter::new()));
        let key = PetKey::named("pet-0");
        let policy = RetryPolicy::immediate(1);

        group.bench_with_input(BenchmarkId::from_parameter(pets), &pets, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    request_delta(&*store, &key, DeltaKind::Food, 1, &policy)
                        .await
                        .unwrap();
                    reconciler.reconcile(&key).await.unwrap()
                })
            })
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(3));
    targets = bench_classify, bench_apply_deltas, bench_decay, bench_reconcile_quiescent, bench_reconcile_delta
}
criterion_main!(benches);
