//! Reconciler test harness
//!
//! Drives a [`Reconciler`] over an in-memory store on a manual clock, so a
//! scenario reads as a sequence of "wait, request, reconcile" steps.

use std::sync::Arc;
use std::time::Duration;

use tamago_core::{
    Clock, DeltaKind, LifecycleEvent, ManualClock, Pet, PetKey, PetSpec, PetStatus, TamagoResult,
};
use tamago_reconcile::{Action, MemoryEmitter, Phase, Reconciler, ReconcilerConfig};
use tamago_store::{request_delta, MemoryStore, ObjectStore, RetryPolicy};

use crate::{ChaosConfig, ChaosStore};

/// Reconciler, store, clock and event sink wired together
pub struct PetHarness<S = MemoryStore> {
    clock: Arc<ManualClock>,
    backing: Arc<MemoryStore>,
    store: Arc<S>,
    events: Arc<MemoryEmitter>,
    reconciler: Reconciler<S>,
    client_retry: RetryPolicy,
}

impl PetHarness<MemoryStore> {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let backing = Arc::new(MemoryStore::with_clock(clock.clone()));
        PetHarness::assemble(clock, backing.clone(), backing, config)
    }
}

impl Default for PetHarness<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl PetHarness<ChaosStore<MemoryStore>> {
    /// Harness whose reconciler and clients go through a chaos store
    pub fn chaotic(chaos: ChaosConfig, config: ReconcilerConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let backing = Arc::new(MemoryStore::with_clock(clock.clone()));
        let store = Arc::new(ChaosStore::new(backing.clone(), chaos));
        PetHarness::assemble(clock, backing, store, config)
    }
}

impl<S: ObjectStore> PetHarness<S> {
    fn assemble(
        clock: Arc<ManualClock>,
        backing: Arc<MemoryStore>,
        store: Arc<S>,
        config: ReconcilerConfig,
    ) -> Self {
        let events = Arc::new(MemoryEmitter::new());
        let client_retry = RetryPolicy::immediate(config.write_retry.max_attempts.max(10));
        let reconciler =
            Reconciler::with_config(store.clone(), events.clone(), clock.clone(), config);
        PetHarness {
            clock,
            backing,
            store,
            events,
            reconciler,
            client_retry,
        }
    }

    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The underlying memory store, bypassing any fault injection
    pub fn backing(&self) -> &Arc<MemoryStore> {
        &self.backing
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    /// Create a fresh, uninitialized pet
    pub async fn hatch(&self, name: &str, spec: PetSpec) -> TamagoResult<PetKey> {
        let pet = self.backing.create(Pet::new(PetKey::named(name), spec)).await?;
        Ok(pet.key)
    }

    /// Create an initialized pet last modified now
    pub async fn adopt(
        &self,
        name: &str,
        spec: PetSpec,
        food: i64,
        love: i64,
    ) -> TamagoResult<PetKey> {
        let mut pet = Pet::new(PetKey::named(name), spec);
        pet.status = PetStatus {
            food,
            love,
            initialized: true,
            modified_time: Some(self.clock.now()),
            ..PetStatus::default()
        };
        let pet = self.backing.create(pet).await?;
        Ok(pet.key)
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Ask for a delta through the client helper
    pub async fn request(&self, key: &PetKey, kind: DeltaKind, amount: i64) -> TamagoResult<i64> {
        request_delta(&*self.store, key, kind, amount, &self.client_retry).await
    }

    pub async fn reconcile(&self, key: &PetKey) -> TamagoResult<Action> {
        self.reconciler.reconcile(key).await
    }

    /// Reconcile until the record needs nothing more at the current time.
    ///
    /// Errors are retried up to `max_passes` total passes.
    pub async fn settle(&self, key: &PetKey, max_passes: usize) -> TamagoResult<Action> {
        let mut last = None;
        for _ in 0..max_passes {
            match self.reconcile(key).await {
                Ok(action) => {
                    if matches!(
                        action.phase,
                        Phase::Quiescent | Phase::Starved | Phase::Missing
                    ) {
                        return Ok(action);
                    }
                    last = Some(Ok(action));
                }
                Err(e) => last = Some(Err(e)),
            }
        }
        tracing::debug!(key = %key, max_passes, "record did not settle");
        last.unwrap_or(Ok(Action::await_change(Phase::Missing)))
    }

    /// Current record, read without fault injection
    pub fn pet(&self, key: &PetKey) -> Option<Pet> {
        self.backing.snapshot(key)
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.events()
    }

    pub fn take_events(&self) -> Vec<LifecycleEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tamago_core::LifecycleReason;

    #[tokio::test]
    async fn test_hatch_and_settle() {
        let harness = PetHarness::new();
        let key = harness.hatch("mochi", PetSpec::new("Mochi")).await.unwrap();

        let action = harness.settle(&key, 5).await.unwrap();
        assert_eq!(action.phase, Phase::Quiescent);

        let pet = harness.pet(&key).unwrap();
        assert_eq!((pet.status.food, pet.status.love), (100, 100));
    }

    #[tokio::test]
    async fn test_neglect_until_death() {
        let harness = PetHarness::new();
        let spec = PetSpec::new("Mochi").with_decay_rates(40, 1);
        let key = harness.adopt("mochi", spec, 100, 100).await.unwrap();

        for _ in 0..3 {
            harness.advance(Duration::from_secs(10));
            harness.settle(&key, 5).await.unwrap();
        }

        let pet = harness.pet(&key).unwrap();
        assert_eq!(pet.status.food, 0);
        let reasons: Vec<_> = harness.events().iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec![LifecycleReason::NeedsFood, LifecycleReason::Dead]);

        harness.advance(Duration::from_secs(10));
        let action = harness.settle(&key, 5).await.unwrap();
        assert_eq!(action.phase, Phase::Starved);
    }

    #[tokio::test]
    async fn test_chaotic_feed_applied_once() {
        let harness = PetHarness::chaotic(ChaosConfig::contended(), ReconcilerConfig::contended());
        let key = harness
            .adopt("mochi", PetSpec::new("Mochi"), 20, 50)
            .await
            .unwrap();

        harness.request(&key, DeltaKind::Food, 30).await.unwrap();
        harness.settle(&key, 20).await.unwrap();

        let pet = harness.pet(&key).unwrap();
        assert_eq!(pet.status.food, 50);
        assert!(pet.pending_deltas.is_empty());
        assert!(harness.store().stats().writes > 0);
    }
}
