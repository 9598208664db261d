//! Object store client contract

use std::future::Future;

use tamago_core::{Pet, PetKey, ResourceVersion, TamagoResult};

use crate::{Watch, WatchScope};

/// Key-addressed store of pet records with versioned conditional writes.
///
/// Every successful write stamps the record with a new [`ResourceVersion`].
/// A conditional write against a stale version fails with
/// [`TamagoError::Conflict`](tamago_core::TamagoError::Conflict); a write or
/// read of a missing key fails with
/// [`TamagoError::NotFound`](tamago_core::TamagoError::NotFound).
pub trait ObjectStore: Send + Sync + 'static {
    /// Read the current record and its version
    fn get(&self, key: &PetKey) -> impl Future<Output = TamagoResult<Pet>> + Send;

    /// Replace the record at `record.key` if its version is still `expected`
    fn conditional_write(
        &self,
        record: &Pet,
        expected: ResourceVersion,
    ) -> impl Future<Output = TamagoResult<ResourceVersion>> + Send;

    /// Store a new record, failing if the key is taken
    fn create(&self, record: Pet) -> impl Future<Output = TamagoResult<Pet>> + Send;

    /// Remove a record
    fn delete(&self, key: &PetKey) -> impl Future<Output = TamagoResult<()>> + Send;

    /// All records, oldest first
    fn list(&self) -> impl Future<Output = TamagoResult<Vec<Pet>>> + Send;

    /// Subscribe to change notifications
    fn subscribe(&self, scope: WatchScope) -> Watch;

    /// Resolve once the store can serve consistent reads
    fn wait_for_sync(&self) -> impl Future<Output = TamagoResult<()>> + Send;
}
