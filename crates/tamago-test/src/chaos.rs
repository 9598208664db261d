//! Chaos store
//!
//! Wraps a store and, on a seeded schedule:
//! - Lets a rival writer land just before a conditional write
//! - Fails reads and writes with a transient store error
//! - Delays operations

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tamago_core::{Pet, PetKey, ResourceVersion, TamagoError, TamagoResult};
use tamago_store::{ObjectStore, Watch, WatchScope};

/// Chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    /// Probability that a rival write lands before a conditional write (0.0 - 1.0)
    pub conflict_rate: f64,
    /// Probability that a read or write fails with a store error
    pub error_rate: f64,
    /// Latency range added to every operation, in milliseconds
    pub latency_ms: Option<(u64, u64)>,
    /// Random seed
    pub seed: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            conflict_rate: 0.2,
            error_rate: 0.0,
            latency_ms: None,
            seed: 42,
        }
    }
}

impl ChaosConfig {
    /// No injected faults
    pub fn calm() -> Self {
        ChaosConfig {
            conflict_rate: 0.0,
            ..Default::default()
        }
    }

    /// Frequent conflicts, as under many concurrent writers
    pub fn contended() -> Self {
        ChaosConfig {
            conflict_rate: 0.5,
            ..Default::default()
        }
    }

    /// Conflicts, transient errors and jittery latency
    pub fn hostile() -> Self {
        ChaosConfig {
            conflict_rate: 0.4,
            error_rate: 0.1,
            latency_ms: Some((0, 3)),
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Injected fault counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub reads: u64,
    pub writes: u64,
    pub injected_conflicts: u64,
    pub injected_errors: u64,
}

/// Store wrapper injecting faults
pub struct ChaosStore<S> {
    inner: Arc<S>,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
    stats: Mutex<ChaosStats>,
}

impl<S: ObjectStore> ChaosStore<S> {
    pub fn new(inner: Arc<S>, config: ChaosConfig) -> Self {
        ChaosStore {
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            inner,
            config,
            stats: Mutex::new(ChaosStats::default()),
        }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    pub fn stats(&self) -> ChaosStats {
        self.stats.lock().clone()
    }

    fn roll(&self, probability: f64) -> bool {
        probability > 0.0 && self.rng.lock().gen_bool(probability.min(1.0))
    }

    async fn delay(&self) {
        let Some((min, max)) = self.config.latency_ms else {
            return;
        };
        let ms = if max > min {
            self.rng.lock().gen_range(min..=max)
        } else {
            min
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn maybe_fail(&self, op: &str, key: &PetKey) -> TamagoResult<()> {
        if self.roll(self.config.error_rate) {
            self.stats.lock().injected_errors += 1;
            return Err(TamagoError::Store(format!("injected {op} failure on {key}")));
        }
        Ok(())
    }

    /// Rewrite the current record unchanged so its version moves on
    async fn rival_write(&self, key: &PetKey) -> TamagoResult<()> {
        let current = self.inner.get(key).await?;
        self.inner
            .conditional_write(&current, current.version)
            .await?;
        self.stats.lock().injected_conflicts += 1;
        tracing::trace!(key = %key, "rival write injected");
        Ok(())
    }
}

impl<S: ObjectStore> ObjectStore for ChaosStore<S> {
    async fn get(&self, key: &PetKey) -> TamagoResult<Pet> {
        self.delay().await;
        self.stats.lock().reads += 1;
        self.maybe_fail("read", key)?;
        self.inner.get(key).await
    }

    async fn conditional_write(
        &self,
        record: &Pet,
        expected: ResourceVersion,
    ) -> TamagoResult<ResourceVersion> {
        self.delay().await;
        self.stats.lock().writes += 1;
        self.maybe_fail("write", &record.key)?;
        if self.roll(self.config.conflict_rate) {
            match self.rival_write(&record.key).await {
                Ok(()) | Err(TamagoError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.inner.conditional_write(record, expected).await
    }

    async fn create(&self, record: Pet) -> TamagoResult<Pet> {
        self.inner.create(record).await
    }

    async fn delete(&self, key: &PetKey) -> TamagoResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self) -> TamagoResult<Vec<Pet>> {
        self.inner.list().await
    }

    fn subscribe(&self, scope: WatchScope) -> Watch {
        self.inner.subscribe(scope)
    }

    async fn wait_for_sync(&self) -> TamagoResult<()> {
        self.inner.wait_for_sync().await
    }
}
