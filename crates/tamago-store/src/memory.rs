//! In-memory object store
//!
//! Records live in a map behind a read-write lock. One version counter is
//! shared by all records, so versions are unique store-wide and strictly
//! increasing. Every successful mutation is broadcast to watchers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};

use tamago_core::{Clock, Pet, PetKey, ResourceVersion, SystemClock, TamagoError, TamagoResult};

use crate::{ObjectStore, Watch, WatchEvent, WatchScope};

/// Default capacity of the change notification channel
pub const DEFAULT_WATCH_CAPACITY: usize = 1024;

#[derive(Default)]
struct Records {
    pets: HashMap<PetKey, Pet>,
    last_version: u64,
}

impl Records {
    fn next_version(&mut self) -> ResourceVersion {
        self.last_version += 1;
        ResourceVersion::new(self.last_version)
    }
}

/// Versioned in-memory store
pub struct MemoryStore {
    records: RwLock<Records>,
    events: broadcast::Sender<WatchEvent>,
    synced: watch::Sender<bool>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store that is immediately synced
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store whose creation timestamps come from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Self::unsynced(clock);
        store.mark_synced();
        store
    }

    /// Create a store that holds readers at the sync barrier until
    /// [`MemoryStore::mark_synced`] is called
    pub fn unsynced(clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_WATCH_CAPACITY);
        let (synced, _) = watch::channel(false);
        MemoryStore {
            records: RwLock::new(Records::default()),
            events,
            synced,
            clock,
        }
    }

    /// Open the sync barrier
    pub fn mark_synced(&self) {
        self.synced.send_replace(true);
    }

    pub fn is_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().pets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().pets.is_empty()
    }

    /// Read a record without going through the async client
    pub fn snapshot(&self, key: &PetKey) -> Option<Pet> {
        self.records.read().pets.get(key).cloned()
    }

    fn notify(&self, event: WatchEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    pub(crate) fn write(
        &self,
        record: &Pet,
        expected: ResourceVersion,
    ) -> TamagoResult<ResourceVersion> {
        record.validate()?;

        let version = {
            let mut records = self.records.write();
            let current = records
                .pets
                .get(&record.key)
                .ok_or_else(|| TamagoError::NotFound(record.key.clone()))?;

            if current.version != expected {
                return Err(TamagoError::Conflict {
                    key: record.key.clone(),
                    expected,
                    actual: current.version,
                });
            }

            let created_at = current.created_at;
            let version = records.next_version();
            let mut stored = record.clone();
            stored.version = version;
            stored.created_at = created_at;
            records.pets.insert(stored.key.clone(), stored);
            version
        };

        tracing::trace!(key = %record.key, %version, "record written");
        self.notify(WatchEvent::Modified {
            key: record.key.clone(),
            version,
        });
        Ok(version)
    }

    pub(crate) fn insert(&self, mut record: Pet) -> TamagoResult<Pet> {
        record.validate()?;

        {
            let mut records = self.records.write();
            if records.pets.contains_key(&record.key) {
                return Err(TamagoError::AlreadyExists(record.key));
            }
            record.version = records.next_version();
            record.created_at = Some(self.clock.now());
            records.pets.insert(record.key.clone(), record.clone());
        }

        tracing::debug!(key = %record.key, version = %record.version, "record created");
        self.notify(WatchEvent::Added {
            key: record.key.clone(),
            version: record.version,
        });
        Ok(record)
    }

    pub(crate) fn remove(&self, key: &PetKey) -> TamagoResult<()> {
        let removed = self.records.write().pets.remove(key);
        if removed.is_none() {
            return Err(TamagoError::NotFound(key.clone()));
        }

        tracing::debug!(key = %key, "record deleted");
        self.notify(WatchEvent::Deleted { key: key.clone() });
        Ok(())
    }

    fn sorted(&self) -> Vec<Pet> {
        let mut pets: Vec<Pet> = self.records.read().pets.values().cloned().collect();
        pets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.key.cmp(&b.key)));
        pets
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    async fn get(&self, key: &PetKey) -> TamagoResult<Pet> {
        self.snapshot(key)
            .ok_or_else(|| TamagoError::NotFound(key.clone()))
    }

    async fn conditional_write(
        &self,
        record: &Pet,
        expected: ResourceVersion,
    ) -> TamagoResult<ResourceVersion> {
        self.write(record, expected)
    }

    async fn create(&self, record: Pet) -> TamagoResult<Pet> {
        self.insert(record)
    }

    async fn delete(&self, key: &PetKey) -> TamagoResult<()> {
        self.remove(key)
    }

    async fn list(&self) -> TamagoResult<Vec<Pet>> {
        Ok(self.sorted())
    }

    fn subscribe(&self, scope: WatchScope) -> Watch {
        Watch::new(self.events.subscribe(), scope)
    }

    async fn wait_for_sync(&self) -> TamagoResult<()> {
        let mut synced = self.synced.subscribe();
        loop {
            let ready = *synced.borrow_and_update();
            if ready {
                return Ok(());
            }
            synced
                .changed()
                .await
                .map_err(|_| TamagoError::NotSynced("store closed before sync".into()))?;
        }
    }
}
