//! One-time initialization

use tamago_core::{PetKey, PetStatus, TamagoResult, Timestamp, VITALITY_MAX};
use tamago_store::{update_with_retry, Commit, Mutation, ObjectStore, RetryPolicy};

/// Status of a newly initialized pet: full food and love, marked initialized
pub fn initial_status(status: &PetStatus, now: Timestamp) -> PetStatus {
    PetStatus {
        food: VITALITY_MAX,
        love: VITALITY_MAX,
        initialized: true,
        modified_time: Some(now),
        ..status.clone()
    }
}

/// Initialize the pet at `key` if it still needs it.
///
/// A concurrent initializer that lands first turns this into an abort,
/// so the transition happens at most once.
pub async fn initialize<S: ObjectStore>(
    store: &S,
    key: &PetKey,
    now: Timestamp,
    policy: &RetryPolicy,
) -> TamagoResult<Commit<()>> {
    update_with_retry(store, key, policy, |pet| {
        if !pet.is_uninitialized() {
            return Ok(Mutation::Abort(()));
        }
        let mut next = pet.clone();
        next.status = initial_status(&pet.status, now);
        Ok(Mutation::Write(next, ()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tamago_core::{Pet, PetSpec};
    use tamago_store::MemoryStore;

    #[tokio::test]
    async fn test_initialize_sets_full_vitality() {
        let store = MemoryStore::new();
        let key = PetKey::named("mochi");
        store
            .create(Pet::new(key.clone(), PetSpec::new("Mochi")))
            .await
            .unwrap();
        let now = chrono::Utc::now();

        let commit = initialize(&store, &key, now, &RetryPolicy::default())
            .await
            .unwrap();
        let record = commit.record().unwrap();
        assert_eq!(record.status.food, 100);
        assert_eq!(record.status.love, 100);
        assert!(record.status.initialized);
        assert_eq!(record.status.modified_time, Some(now));

        let again = initialize(&store, &key, now, &RetryPolicy::default())
            .await
            .unwrap();
        assert!(matches!(again, Commit::Aborted(())));
    }

    #[tokio::test]
    async fn test_initialize_skips_flagged_record() {
        let store = MemoryStore::new();
        let key = PetKey::named("mochi");
        let mut pet = Pet::new(key.clone(), PetSpec::new("Mochi"));
        pet.status.initialized = true;
        store.create(pet).await.unwrap();

        let commit = initialize(&store, &key, chrono::Utc::now(), &RetryPolicy::default())
            .await
            .unwrap();
        assert!(!commit.is_written());
        assert_eq!(store.snapshot(&key).unwrap().status.food, 0);
    }

    #[tokio::test]
    async fn test_initialize_missing_is_gone() {
        let store = MemoryStore::new();
        let commit = initialize(
            &store,
            &PetKey::named("ghost"),
            chrono::Utc::now(),
            &RetryPolicy::default(),
        )
        .await
        .unwrap();
        assert!(matches!(commit, Commit::Gone));
    }
}
