//! Reconciliation engine
//!
//! One pass reads the record, classifies it, performs at most one
//! transition and reports when the key should be looked at again.

use std::sync::Arc;
use std::time::Duration;

use tamago_core::{
    Clock, LifecycleEvent, LifecycleReason, Pet, PetKey, SystemClock, TamagoResult, Timestamp,
};
use tamago_store::{Commit, ObjectStore};

use crate::{
    consume_deltas, decay, initialize, until_next_decay, EventEmitter, Phase, ReconcilerConfig,
};

/// Outcome of one reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Action {
    /// Phase the record was classified in
    pub phase: Phase,
    /// Reconcile again after this long; `None` waits for the next change
    pub requeue_after: Option<Duration>,
}

impl Action {
    pub fn requeue(phase: Phase, after: Duration) -> Self {
        Action {
            phase,
            requeue_after: Some(after),
        }
    }

    pub fn await_change(phase: Phase) -> Self {
        Action {
            phase,
            requeue_after: None,
        }
    }
}

/// Pet reconciler
pub struct Reconciler<S> {
    store: Arc<S>,
    emitter: Arc<dyn EventEmitter>,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
}

impl<S: ObjectStore> Reconciler<S> {
    /// Reconciler on the system clock with default configuration
    pub fn new(store: Arc<S>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self::with_config(store, emitter, Arc::new(SystemClock), ReconcilerConfig::default())
    }

    pub fn with_config(
        store: Arc<S>,
        emitter: Arc<dyn EventEmitter>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Reconciler {
            store,
            emitter,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconcile the record at `key` once.
    ///
    /// Errors are returned for the caller to retry with backoff; a record
    /// that disappears at any point ends the pass as [`Phase::Missing`].
    pub async fn reconcile(&self, key: &PetKey) -> TamagoResult<Action> {
        let pet = match self.store.get(key).await {
            Ok(pet) => pet,
            Err(e) if e.is_not_found() => {
                tracing::debug!(key = %key, "pet not found, nothing to reconcile");
                return Ok(Action::await_change(Phase::Missing));
            }
            Err(e) => return Err(e),
        };

        let now = self.clock.now();
        let interval = pet.spec.decay_interval;
        let phase = Phase::classify(&pet, now);
        tracing::trace!(key = %key, %phase, version = pet.version.0, "classified");

        match phase {
            Phase::Uninitialized => {
                let commit = initialize(&*self.store, key, now, &self.config.init_retry).await?;
                if commit.is_written() {
                    tracing::info!(key = %key, nickname = %pet.spec.nickname, "pet initialized");
                }
                Ok(self.settle(phase, &commit, interval))
            }
            Phase::PendingDelta => {
                let commit = consume_deltas(
                    &*self.store,
                    key,
                    now,
                    &self.config.write_retry,
                    self.config.malformed_deltas,
                )
                .await?;
                if let Commit::Written { record, outcome, .. } = &commit {
                    tracing::info!(
                        key = %key,
                        food_delta = ?outcome.food,
                        love_delta = ?outcome.love,
                        food = record.status.food,
                        love = record.status.love,
                        "pending deltas applied"
                    );
                }
                Ok(self.settle(phase, &commit, interval))
            }
            Phase::Quiescent => Ok(Action::requeue(phase, until_next_decay(&pet, now))),
            Phase::Starved => {
                tracing::debug!(key = %key, "food exhausted, decay suspended");
                Ok(Action::requeue(phase, interval))
            }
            Phase::Decay => {
                let commit = decay(&*self.store, key, now, &self.config.write_retry).await?;
                if let Commit::Written { record, outcome, .. } = &commit {
                    tracing::debug!(
                        key = %key,
                        food = record.status.food,
                        love = record.status.love,
                        "decayed"
                    );
                    if let Some(reason) = outcome {
                        self.emit(record, *reason, now);
                    }
                }
                Ok(self.settle(phase, &commit, interval))
            }
            Phase::Missing => Ok(Action::await_change(phase)),
        }
    }

    fn settle<T>(&self, phase: Phase, commit: &Commit<T>, interval: Duration) -> Action {
        match commit {
            Commit::Gone => Action::await_change(Phase::Missing),
            _ => Action::requeue(phase, interval),
        }
    }

    fn emit(&self, pet: &Pet, reason: LifecycleReason, at: Timestamp) {
        self.emitter.emit(LifecycleEvent::new(
            pet.key.clone(),
            reason,
            &pet.spec.nickname,
            at,
        ));
    }
}
