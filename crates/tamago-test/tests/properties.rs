//! Property and concurrency tests for the reconciler

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use tamago_core::{
    saturating_add, Clock, DeltaKind, LifecycleReason, Pet, PetKey, PetSpec, PetStatus,
    PendingDeltas, SystemClock, TamagoError, FEED_DELTA_KEY,
};
use tamago_reconcile::{
    apply_deltas, decay_due, decay_status, MemoryEmitter, Phase, Reconciler, ReconcilerConfig,
};
use tamago_store::{request_delta, MemoryStore, ObjectStore, RetryPolicy};
use tamago_test::{ChaosConfig, PetHarness};

fn status(food: i64, love: i64) -> PetStatus {
    PetStatus {
        food,
        love,
        initialized: true,
        ..PetStatus::default()
    }
}

proptest! {
    #[test]
    fn prop_deltas_stay_in_bounds(
        food in 0i64..=100,
        love in 0i64..=100,
        food_delta in proptest::option::of(any::<i64>()),
        love_delta in proptest::option::of(any::<i64>()),
    ) {
        let deltas = PendingDeltas { food: food_delta, love: love_delta };
        let next = apply_deltas(&status(food, love), deltas, chrono::Utc::now());
        prop_assert!(next.in_bounds());
    }

    #[test]
    fn prop_decay_never_increases(
        food in 0i64..=100,
        love in 0i64..=100,
        food_rate in 0u32..=200,
        love_rate in 0u32..=200,
    ) {
        let spec = PetSpec::new("p").with_decay_rates(food_rate, love_rate);
        let next = decay_status(&status(food, love), &spec, chrono::Utc::now());
        prop_assert!(next.in_bounds());
        prop_assert!(next.food <= food);
        prop_assert!(next.love <= love);
    }

    #[test]
    fn prop_event_priority(food in -10i64..=110, love in -10i64..=110) {
        let reason = LifecycleReason::evaluate(food, love);
        if food <= 0 {
            prop_assert_eq!(reason, Some(LifecycleReason::Dead));
        } else if love <= 0 {
            prop_assert_eq!(reason, Some(LifecycleReason::NeedsLove));
        } else if food < 30 {
            prop_assert_eq!(reason, Some(LifecycleReason::NeedsFood));
        } else {
            prop_assert_eq!(reason, None);
        }
    }

    #[test]
    fn prop_decay_phase_implies_due(
        food in 0i64..=100,
        elapsed_secs in 0u64..=60,
        interval_secs in 1u64..=30,
    ) {
        let now = chrono::Utc::now();
        let mut pet = Pet::new(
            PetKey::named("p"),
            PetSpec::new("p").with_decay_interval(Duration::from_secs(interval_secs)),
        );
        pet.status = status(food, 50);
        pet.status.modified_time = Some(now - chrono::Duration::seconds(elapsed_secs as i64));

        let phase = Phase::classify(&pet, now);
        prop_assert_eq!(
            matches!(phase, Phase::Decay | Phase::Starved),
            decay_due(&pet, now)
        );
        prop_assert_eq!(phase == Phase::Starved, decay_due(&pet, now) && food == 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_initialization_writes_once() {
    let store = Arc::new(MemoryStore::new());
    let key = PetKey::named("mochi");
    let created = store
        .create(Pet::new(key.clone(), PetSpec::new("Mochi")))
        .await
        .unwrap();
    let reconciler = Arc::new(Reconciler::with_config(
        store.clone(),
        Arc::new(MemoryEmitter::new()),
        Arc::new(SystemClock),
        ReconcilerConfig::default(),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let reconciler = Arc::clone(&reconciler);
            let key = key.clone();
            tokio::spawn(async move { reconciler.reconcile(&key).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let pet = store.get(&key).await.unwrap();
    assert_eq!(pet.version.0, created.version.0 + 1);
    assert_eq!((pet.status.food, pet.status.love), (100, 100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_all_counted() {
    let store = Arc::new(MemoryStore::new());
    let key = PetKey::named("mochi");
    let mut pet = Pet::new(key.clone(), PetSpec::new("Mochi"));
    pet.status = status(10, 10);
    store.create(pet).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move {
                request_delta(&*store, &key, DeltaKind::Food, 5, &RetryPolicy::immediate(16)).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let reconciler = Reconciler::new(store.clone(), Arc::new(MemoryEmitter::new()));
    reconciler.reconcile(&key).await.unwrap();

    let pet = store.get(&key).await.unwrap();
    assert_eq!(pet.status.food, 50);
    assert!(pet.pending_deltas.is_empty());
}

#[tokio::test]
async fn test_feed_under_conflicts_applies_once() {
    let harness = PetHarness::chaotic(
        ChaosConfig {
            conflict_rate: 0.5,
            ..ChaosConfig::calm()
        }
        .with_seed(7),
        ReconcilerConfig::contended(),
    );
    let key = harness
        .adopt("mochi", PetSpec::new("Mochi"), 40, 40)
        .await
        .unwrap();

    harness.request(&key, DeltaKind::Food, 25).await.unwrap();
    harness.request(&key, DeltaKind::Love, -15).await.unwrap();
    harness.settle(&key, 30).await.unwrap();

    let pet = harness.pet(&key).unwrap();
    assert_eq!((pet.status.food, pet.status.love), (65, 25));
    assert!(harness.store().stats().injected_conflicts > 0);
}

#[tokio::test]
async fn test_decay_once_per_interval_despite_long_idle() {
    let harness = PetHarness::new();
    let spec = PetSpec::new("Mochi").with_decay_rates(10, 5);
    let key = harness.adopt("mochi", spec, 80, 80).await.unwrap();

    harness.advance(Duration::from_secs(3600));
    harness.settle(&key, 5).await.unwrap();

    let pet = harness.pet(&key).unwrap();
    assert_eq!((pet.status.food, pet.status.love), (70, 75));
}

#[tokio::test]
async fn test_deleted_pet_is_missing() {
    let harness = PetHarness::new();
    let key = harness.hatch("mochi", PetSpec::new("Mochi")).await.unwrap();
    harness.backing().delete(&key).await.unwrap();

    let action = harness.reconcile(&key).await.unwrap();
    assert_eq!(action.phase, Phase::Missing);
    assert_eq!(action.requeue_after, None);
}

#[tokio::test]
async fn test_future_modified_time_waits_full_interval() {
    let harness = PetHarness::new();
    let key = harness
        .adopt("mochi", PetSpec::new("Mochi"), 50, 50)
        .await
        .unwrap();
    let mut pet = harness.pet(&key).unwrap();
    pet.status.modified_time = Some(saturating_add(
        harness.clock().now(),
        Duration::from_secs(120),
    ));
    harness
        .backing()
        .conditional_write(&pet, pet.version)
        .await
        .unwrap();

    let action = harness.reconcile(&key).await.unwrap();
    assert_eq!(action.phase, Phase::Quiescent);
    assert_eq!(action.requeue_after, Some(Duration::from_secs(10)));
}

fn always_conflicting() -> PetHarness<tamago_test::ChaosStore<MemoryStore>> {
    PetHarness::chaotic(
        ChaosConfig {
            conflict_rate: 1.0,
            ..ChaosConfig::calm()
        },
        ReconcilerConfig::default(),
    )
}

#[tokio::test]
async fn test_initialization_exhausted_leaves_record_untouched() {
    let harness = always_conflicting();
    let key = harness.hatch("mochi", PetSpec::new("Mochi")).await.unwrap();

    match harness.reconcile(&key).await {
        Err(TamagoError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 10),
        other => panic!("unexpected result: {:?}", other),
    }

    let pet = harness.pet(&key).unwrap();
    assert!(!pet.status.initialized);
    assert_eq!((pet.status.food, pet.status.love), (0, 0));
    assert!(pet.status.modified_time.is_none());
}

#[tokio::test]
async fn test_delta_exhausted_keeps_request_pending() {
    let harness = always_conflicting();
    let key = harness
        .adopt("mochi", PetSpec::new("Mochi"), 40, 40)
        .await
        .unwrap();
    request_delta(
        &**harness.backing(),
        &key,
        DeltaKind::Food,
        20,
        &RetryPolicy::immediate(1),
    )
    .await
    .unwrap();

    match harness.reconcile(&key).await {
        Err(TamagoError::RetriesExhausted { attempts, .. }) => {
            assert_eq!(attempts, RetryPolicy::default().max_attempts)
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let pet = harness.pet(&key).unwrap();
    assert_eq!(pet.status.food, 40);
    assert_eq!(pet.pending_deltas.get(FEED_DELTA_KEY).map(String::as_str), Some("20"));
}

#[tokio::test]
async fn test_decay_exhausted_emits_nothing() {
    let harness = always_conflicting();
    let spec = PetSpec::new("Mochi").with_decay_rates(30, 5);
    let key = harness.adopt("mochi", spec, 40, 40).await.unwrap();
    harness.advance(Duration::from_secs(11));

    assert!(matches!(
        harness.reconcile(&key).await,
        Err(TamagoError::RetriesExhausted { .. })
    ));

    let pet = harness.pet(&key).unwrap();
    assert_eq!((pet.status.food, pet.status.love), (40, 40));
    assert!(harness.events().is_empty());
}
