//! Delta request helper for control clients
//!
//! Clients never touch `status`. They ask for a change by writing a signed
//! integer under the pending delta key of the counter they want to move and
//! let the reconciler apply it.

use tamago_core::{parse_delta, DeltaKind, PetKey, TamagoError, TamagoResult};

use crate::{update_with_retry, Commit, Mutation, ObjectStore, RetryPolicy};

/// Add `amount` to the pending delta of `kind`, retrying on conflict.
///
/// A delta already pending for the same counter is summed with `amount`;
/// an unparsable one is replaced. Returns the value now pending.
pub async fn request_delta<S: ObjectStore>(
    store: &S,
    key: &PetKey,
    kind: DeltaKind,
    amount: i64,
    policy: &RetryPolicy,
) -> TamagoResult<i64> {
    let commit = update_with_retry(store, key, policy, |pet| {
        let pending = pet
            .raw_delta(kind)
            .and_then(parse_delta)
            .map_or(amount, |current| current.saturating_add(amount));

        let mut next = pet.clone();
        next.pending_deltas
            .insert(kind.key().to_string(), pending.to_string());
        Ok(Mutation::Write(next, pending))
    })
    .await?;

    match commit {
        Commit::Written { outcome, attempts, .. } => {
            tracing::debug!(key = %key, %kind, pending = outcome, attempts, "delta requested");
            Ok(outcome)
        }
        Commit::Aborted(outcome) => Ok(outcome),
        Commit::Gone => Err(TamagoError::NotFound(key.clone())),
    }
}
