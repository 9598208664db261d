//! Controller runs against a store injecting conflicts

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use tamago_core::{DeltaKind, Pet, PetKey, PetSpec, SystemClock};
use tamago_reconcile::{MemoryEmitter, Phase, Reconciler, ReconcilerConfig};
use tamago_runtime::{Controller, ControllerConfig};
use tamago_store::{request_delta, MemoryStore, ObjectStore, RetryPolicy};
use tamago_test::{ChaosConfig, ChaosStore};

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_controller_converges_under_conflicts() {
    let backing = Arc::new(MemoryStore::new());
    let store = Arc::new(ChaosStore::new(
        Arc::clone(&backing),
        ChaosConfig::contended().with_seed(11),
    ));

    let keys: Vec<PetKey> = (0..4).map(|i| PetKey::named(format!("pet-{i}"))).collect();
    for key in &keys {
        backing
            .create(Pet::new(key.clone(), PetSpec::new(key.name.clone())))
            .await
            .unwrap();
    }

    let reconciler = Reconciler::with_config(
        Arc::clone(&store),
        Arc::new(MemoryEmitter::new()),
        Arc::new(SystemClock),
        ReconcilerConfig::contended(),
    );
    let config = ControllerConfig {
        workers: 3,
        error_backoff_base: Duration::from_millis(1),
        error_backoff_max: Duration::from_millis(50),
        ..ControllerConfig::default()
    };
    let controller = Arc::new(Controller::new(reconciler, config));
    let stats = controller.stats_handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run(shutdown_rx).await }
    });

    wait_for(|| {
        keys.iter()
            .all(|key| backing.snapshot(key).is_some_and(|pet| pet.status.initialized))
    })
    .await;

    for key in &keys {
        request_delta(&*backing, key, DeltaKind::Food, -30, &RetryPolicy::immediate(10))
            .await
            .unwrap();
        request_delta(&*backing, key, DeltaKind::Love, -50, &RetryPolicy::immediate(10))
            .await
            .unwrap();
    }

    wait_for(|| {
        keys.iter().all(|key| {
            backing
                .snapshot(key)
                .is_some_and(|pet| pet.pending_deltas.is_empty() && pet.status.love <= 50)
        })
    })
    .await;

    shutdown_tx.send(true).unwrap();
    run.await.unwrap().unwrap();

    for key in &keys {
        let pet = backing.snapshot(key).unwrap();
        assert!(pet.status.in_bounds());
        // at most one decay pass may land between the delta and the check
        assert!((69..=70).contains(&pet.status.food), "food {}", pet.status.food);
        assert!((49..=50).contains(&pet.status.love), "love {}", pet.status.love);
    }

    let stats = stats.lock().clone();
    assert!(stats.phase(Phase::Uninitialized) >= 4);
    assert!(stats.phase(Phase::PendingDelta) >= 4);
    assert!(store.stats().injected_conflicts > 0);
}
