//! Informer: feeds store changes into the work queue
//!
//! The subscription is opened before the initial list, so no change made
//! between the two is lost. A lagged subscription triggers a full relist.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use tamago_core::{TamagoError, TamagoResult};
use tamago_store::{Notification, ObjectStore, Watch, WatchScope};

use crate::WorkQueue;

pub struct Informer<S> {
    store: Arc<S>,
    queue: WorkQueue,
    sync_timeout: Duration,
}

impl<S: ObjectStore> Informer<S> {
    pub fn new(store: Arc<S>, queue: WorkQueue, sync_timeout: Duration) -> Self {
        Informer {
            store,
            queue,
            sync_timeout,
        }
    }

    /// Subscribe, wait for the store to sync and enqueue every record.
    ///
    /// Fails with [`TamagoError::NotSynced`] if the store does not sync in time.
    pub async fn sync(&self) -> TamagoResult<Watch> {
        let changes = self.store.subscribe(WatchScope::All);

        match tokio::time::timeout(self.sync_timeout, self.store.wait_for_sync()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TamagoError::NotSynced(format!(
                    "store did not sync within {}",
                    humantime::format_duration(self.sync_timeout)
                )))
            }
        }

        let count = self.relist().await?;
        tracing::info!(pets = count, "informer synced");
        Ok(changes)
    }

    async fn relist(&self) -> TamagoResult<usize> {
        let pets = self.store.list().await?;
        let count = pets.len();
        for pet in pets {
            self.queue.add(pet.key);
        }
        Ok(count)
    }

    /// Forward notifications until shutdown is signalled or the store closes
    pub async fn run(self, mut changes: Watch, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                notification = changes.next() => match notification {
                    Some(Notification::Change(event)) => {
                        tracing::trace!(key = %event.key(), ?event, "change observed");
                        self.queue.add(event.key().clone());
                    }
                    Some(Notification::Lagged(missed)) => {
                        tracing::warn!(missed, "watch lagged, relisting");
                        if let Err(e) = self.relist().await {
                            tracing::warn!(error = %e, "relist failed");
                        }
                    }
                    None => {
                        tracing::debug!("watch closed");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tamago_core::{Pet, PetKey, PetSpec, SystemClock};
    use tamago_store::MemoryStore;

    #[tokio::test]
    async fn test_sync_enqueues_existing() {
        let store = Arc::new(MemoryStore::new());
        for name in ["a", "b"] {
            store
                .create(Pet::new(PetKey::named(name), PetSpec::new(name)))
                .await
                .unwrap();
        }
        let queue = WorkQueue::new();
        let informer = Informer::new(store, queue.clone(), Duration::from_secs(1));

        informer.sync().await.unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_times_out() {
        let store = Arc::new(MemoryStore::unsynced(Arc::new(SystemClock)));
        let informer = Informer::new(store, WorkQueue::new(), Duration::from_millis(20));

        let err = informer.sync().await.unwrap_err();
        assert!(matches!(err, TamagoError::NotSynced(_)));
    }

    #[tokio::test]
    async fn test_run_forwards_changes() {
        let store = Arc::new(MemoryStore::new());
        let queue = WorkQueue::new();
        let informer = Informer::new(store.clone(), queue.clone(), Duration::from_secs(1));
        let changes = informer.sync().await.unwrap();

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(informer.run(changes, rx));

        store
            .create(Pet::new(PetKey::named("mochi"), PetSpec::new("Mochi")))
            .await
            .unwrap();
        let got = tokio::time::timeout(Duration::from_secs(1), queue.get())
            .await
            .unwrap();
        assert_eq!(got, Some(PetKey::named("mochi")));

        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
