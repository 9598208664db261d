//! Pending delta application
//!
//! Deltas are parsed from the fresh read on every attempt. Applying them and
//! clearing their keys is a single conditional write, so a delta is consumed
//! exactly once even when the write has to be retried.

use tamago_core::{
    clamp_vitality, DeltaKind, PendingDeltas, PetKey, PetStatus, TamagoError, TamagoResult,
    Timestamp,
};
use tamago_store::{update_with_retry, Commit, Mutation, ObjectStore, RetryPolicy};

use crate::MalformedDeltaPolicy;

/// Apply parsed deltas to a status.
///
/// Counters are clamped to the vitality range. A non-zero delta stamps the
/// matching fed/pet time; a zero delta changes nothing. `modified_time` is
/// left alone so a feed does not postpone decay.
pub fn apply_deltas(status: &PetStatus, deltas: PendingDeltas, now: Timestamp) -> PetStatus {
    let mut next = status.clone();
    if let Some(delta) = deltas.food.filter(|d| *d != 0) {
        next.food = clamp_vitality(status.food.saturating_add(delta));
        next.fed_time = Some(now);
    }
    if let Some(delta) = deltas.love.filter(|d| *d != 0) {
        next.love = clamp_vitality(status.love.saturating_add(delta));
        next.pet_time = Some(now);
    }
    next
}

/// Consume the pending deltas of the pet at `key`.
///
/// A malformed value fails the whole application with
/// [`TamagoError::MalformedDelta`]. Under [`MalformedDeltaPolicy::Discard`]
/// the offending keys are removed before the error is returned.
pub async fn consume_deltas<S: ObjectStore>(
    store: &S,
    key: &PetKey,
    now: Timestamp,
    policy: &RetryPolicy,
    malformed: MalformedDeltaPolicy,
) -> TamagoResult<Commit<PendingDeltas>> {
    let result = update_with_retry(store, key, policy, |pet| {
        if !pet.has_pending_deltas() {
            return Ok(Mutation::Abort(PendingDeltas::default()));
        }
        let deltas = pet.parse_deltas()?;

        let mut next = pet.clone();
        next.clear_deltas(&DeltaKind::ALL);
        if !deltas.is_noop() {
            next.status = apply_deltas(&pet.status, deltas, now);
        }
        Ok(Mutation::Write(next, deltas))
    })
    .await;

    match result {
        Err(err @ TamagoError::MalformedDelta { .. })
            if malformed == MalformedDeltaPolicy::Discard =>
        {
            let discarded = discard_malformed(store, key, policy).await?;
            tracing::warn!(key = %key, ?discarded, error = %err, "malformed deltas discarded");
            Err(err)
        }
        other => other,
    }
}

/// Remove every malformed delta key, leaving well-formed ones pending
async fn discard_malformed<S: ObjectStore>(
    store: &S,
    key: &PetKey,
    policy: &RetryPolicy,
) -> TamagoResult<Vec<DeltaKind>> {
    let commit = update_with_retry(store, key, policy, |pet| {
        let malformed = pet.malformed_deltas();
        if malformed.is_empty() {
            return Ok(Mutation::Abort(malformed));
        }
        let mut next = pet.clone();
        next.clear_deltas(&malformed);
        Ok(Mutation::Write(next, malformed))
    })
    .await?;

    Ok(match commit {
        Commit::Written { outcome, .. } | Commit::Aborted(outcome) => outcome,
        Commit::Gone => Vec::new(),
    })
}
