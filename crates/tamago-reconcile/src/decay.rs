//! Time-based decay

use tamago_core::{
    clamp_vitality, LifecycleReason, PetKey, PetSpec, PetStatus, TamagoResult, Timestamp,
};
use tamago_store::{update_with_retry, Commit, Mutation, ObjectStore, RetryPolicy};

use crate::Phase;

/// Subtract one interval's worth of decay and stamp `modified_time`.
///
/// Exactly one step is applied however long the record sat idle.
pub fn decay_status(status: &PetStatus, spec: &PetSpec, now: Timestamp) -> PetStatus {
    PetStatus {
        food: clamp_vitality(status.food.saturating_sub(i64::from(spec.food_decay_rate))),
        love: clamp_vitality(status.love.saturating_sub(i64::from(spec.love_decay_rate))),
        modified_time: Some(now),
        ..status.clone()
    }
}

/// Decay the pet at `key` if it is still due.
///
/// The outcome is the lifecycle condition of the decayed counters. A record
/// that stopped being due (another writer decayed or fed it first) aborts.
pub async fn decay<S: ObjectStore>(
    store: &S,
    key: &PetKey,
    now: Timestamp,
    policy: &RetryPolicy,
) -> TamagoResult<Commit<Option<LifecycleReason>>> {
    update_with_retry(store, key, policy, |pet| {
        if Phase::classify(pet, now) != Phase::Decay {
            return Ok(Mutation::Abort(None));
        }
        let mut next = pet.clone();
        next.status = decay_status(&pet.status, &pet.spec, now);
        let reason = LifecycleReason::evaluate(next.status.food, next.status.love);
        Ok(Mutation::Write(next, reason))
    })
    .await
}
