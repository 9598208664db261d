//! Controller: informer plus a pool of reconciliation workers

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use tamago_core::{PetKey, TamagoResult};
use tamago_reconcile::{Action, Phase, Reconciler};
use tamago_store::ObjectStore;

use crate::{ControllerConfig, ErrorBackoff, Informer, WorkQueue};

/// Controller counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Successful reconciliation passes
    pub reconciles: u64,
    /// Failed passes
    pub errors: u64,
    /// Delayed requeues scheduled after a successful pass
    pub requeues: u64,
    /// Successful passes per phase, indexed by [`Phase::index`]
    pub phases: [u64; 6],
}

impl ControllerStats {
    pub fn phase(&self, phase: Phase) -> u64 {
        self.phases[phase.index()]
    }

    fn record(&mut self, action: &Action) {
        self.reconciles += 1;
        self.phases[action.phase.index()] += 1;
        if action.requeue_after.is_some() {
            self.requeues += 1;
        }
    }
}

/// Pet controller
pub struct Controller<S> {
    reconciler: Arc<Reconciler<S>>,
    queue: WorkQueue,
    config: ControllerConfig,
    stats: Arc<Mutex<ControllerStats>>,
}

impl<S: ObjectStore> Controller<S> {
    pub fn new(reconciler: Reconciler<S>, config: ControllerConfig) -> Self {
        let queue = WorkQueue::with_backoff(ErrorBackoff {
            base: config.error_backoff_base,
            max: config.error_backoff_max,
        });
        Controller {
            reconciler: Arc::new(reconciler),
            queue,
            config,
            stats: Arc::new(Mutex::new(ControllerStats::default())),
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Handle for reading stats while the controller runs
    pub fn stats_handle(&self) -> Arc<Mutex<ControllerStats>> {
        Arc::clone(&self.stats)
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats.lock().clone()
    }

    /// Run until `shutdown` turns true.
    ///
    /// Fails only if the initial sync fails. In-flight passes finish before
    /// this returns.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> TamagoResult<()> {
        let informer = Informer::new(
            Arc::clone(self.reconciler.store()),
            self.queue.clone(),
            self.config.sync_timeout,
        );
        let changes = informer.sync().await?;
        let informer_task = tokio::spawn(informer.run(changes, shutdown.clone()));

        let workers = self.config.workers.max(1);
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let reconciler = Arc::clone(&self.reconciler);
                let queue = self.queue.clone();
                let stats = Arc::clone(&self.stats);
                tokio::spawn(worker(id, reconciler, queue, stats))
            })
            .collect();
        tracing::info!(workers, "controller started");

        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        tracing::info!("controller shutting down");
        self.queue.shutdown();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "worker panicked");
            }
        }
        if let Err(e) = informer_task.await {
            tracing::error!(error = %e, "informer panicked");
        }

        let stats = self.stats();
        tracing::info!(
            reconciles = stats.reconciles,
            errors = stats.errors,
            requeues = stats.requeues,
            "controller stopped"
        );
        Ok(())
    }
}

async fn worker<S: ObjectStore>(
    id: usize,
    reconciler: Arc<Reconciler<S>>,
    queue: WorkQueue,
    stats: Arc<Mutex<ControllerStats>>,
) {
    while let Some(key) = queue.get().await {
        process(&reconciler, &queue, &stats, &key).await;
        queue.done(&key);
    }
    tracing::debug!(worker = id, "worker stopped");
}

async fn process<S: ObjectStore>(
    reconciler: &Reconciler<S>,
    queue: &WorkQueue,
    stats: &Mutex<ControllerStats>,
    key: &PetKey,
) {
    match reconciler.reconcile(key).await {
        Ok(action) => {
            queue.forget(key);
            stats.lock().record(&action);
            tracing::debug!(
                key = %key,
                phase = %action.phase,
                requeue_after = ?action.requeue_after,
                "reconciled"
            );
            if let Some(after) = action.requeue_after {
                queue.add_after(key.clone(), after);
            }
        }
        Err(e) => {
            stats.lock().errors += 1;
            tracing::warn!(
                key = %key,
                error = %e,
                failures = queue.failures(key) + 1,
                "reconcile failed"
            );
            queue.add_rate_limited(key.clone());
        }
    }
}
