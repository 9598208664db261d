//! Vitality simulation - seeded long-run invariant checking
//!
//! Checks, after every step:
//! - Counters stay within the vitality range
//! - An initialized pet never becomes uninitialized
//! - Decay never lands twice within one interval
//! - Resource versions never move backwards

use std::collections::HashMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tamago_core::{elapsed_between, DeltaKind, PetKey, PetSpec, Timestamp};
use tamago_reconcile::ReconcilerConfig;

use crate::{ChaosConfig, PetHarness};

/// Simulation configuration
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Number of pets
    pub pets: usize,
    /// Number of steps
    pub steps: usize,
    /// Clock advance per step
    pub tick: Duration,
    /// Probability of a feed request per pet per step
    pub feed_prob: f64,
    /// Probability of a pet request per pet per step
    pub pet_prob: f64,
    /// Largest requested amount; negative amounts are drawn too
    pub max_amount: i64,
    /// Faults injected by the store
    pub chaos: ChaosConfig,
    /// Random seed
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            pets: 4,
            steps: 200,
            tick: Duration::from_secs(3),
            feed_prob: 0.1,
            pet_prob: 0.1,
            max_amount: 40,
            chaos: ChaosConfig::default(),
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Short run for unit tests
    pub fn light() -> Self {
        SimulationConfig {
            pets: 2,
            steps: 50,
            chaos: ChaosConfig::calm(),
            ..Default::default()
        }
    }

    /// Long run with heavy contention
    pub fn heavy() -> Self {
        SimulationConfig {
            pets: 8,
            steps: 1000,
            chaos: ChaosConfig::contended(),
            ..Default::default()
        }
    }
}

/// Simulation outcome
#[derive(Clone, Debug, Default)]
pub struct SimulationReport {
    pub steps: usize,
    pub reconciles: u64,
    pub reconcile_errors: u64,
    pub requests: u64,
    pub request_errors: u64,
    pub decays: u64,
    pub events: usize,
    pub violations: Vec<String>,
}

impl SimulationReport {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Clone, Copy, Default)]
struct Observed {
    version: u64,
    initialized: bool,
    modified: Option<Timestamp>,
}

pub struct VitalitySimulation {
    config: SimulationConfig,
    rng: StdRng,
}

impl VitalitySimulation {
    pub fn new(config: SimulationConfig) -> Self {
        VitalitySimulation {
            rng: StdRng::seed_from_u64(config.seed),
            config,
        }
    }

    pub async fn run(mut self) -> SimulationReport {
        let harness = PetHarness::chaotic(
            self.config.chaos.clone(),
            ReconcilerConfig::contended(),
        );
        let mut report = SimulationReport::default();
        let mut observed: HashMap<PetKey, Observed> = HashMap::new();

        let mut keys = Vec::with_capacity(self.config.pets);
        for i in 0..self.config.pets {
            let spec = PetSpec::new(format!("Pet {i}"))
                .with_decay_rates(self.rng.gen_range(1..=10), self.rng.gen_range(1..=10))
                .with_decay_interval(Duration::from_secs(self.rng.gen_range(5..=20)));
            match harness.hatch(&format!("pet-{i}"), spec).await {
                Ok(key) => keys.push(key),
                Err(e) => report.violations.push(format!("hatch pet-{i}: {e}")),
            }
        }

        for step in 0..self.config.steps {
            harness.advance(self.config.tick);

            for key in &keys {
                for (kind, prob) in [
                    (DeltaKind::Food, self.config.feed_prob),
                    (DeltaKind::Love, self.config.pet_prob),
                ] {
                    if self.rng.gen_bool(prob) {
                        let amount = self
                            .rng
                            .gen_range(-self.config.max_amount..=self.config.max_amount);
                        report.requests += 1;
                        if harness.request(key, kind, amount).await.is_err() {
                            report.request_errors += 1;
                        }
                    }
                }

                report.reconciles += 1;
                if harness.reconcile(key).await.is_err() {
                    report.reconcile_errors += 1;
                }

                let Some(pet) = harness.pet(key) else {
                    report.violations.push(format!("step {step}: {key} vanished"));
                    continue;
                };
                let before = observed.get(key).copied().unwrap_or_default();

                if !pet.status.in_bounds() {
                    report.violations.push(format!(
                        "step {step}: {key} out of bounds: food {} love {}",
                        pet.status.food, pet.status.love
                    ));
                }
                if before.initialized && !pet.status.initialized {
                    report
                        .violations
                        .push(format!("step {step}: {key} lost its initialized flag"));
                }
                if pet.version.0 < before.version {
                    report.violations.push(format!(
                        "step {step}: {key} version went back from {} to {}",
                        before.version, pet.version.0
                    ));
                }
                if let (Some(prev), Some(now)) = (before.modified, pet.status.modified_time) {
                    if now != prev {
                        report.decays += 1;
                        if elapsed_between(prev, now) < pet.spec.decay_interval {
                            report.violations.push(format!(
                                "step {step}: {key} decayed twice within {:?}",
                                pet.spec.decay_interval
                            ));
                        }
                    }
                }

                observed.insert(
                    key.clone(),
                    Observed {
                        version: pet.version.0,
                        initialized: pet.status.initialized,
                        modified: pet.status.modified_time,
                    },
                );
            }
            report.steps += 1;
        }

        report.events = harness.events().len();
        tracing::debug!(
            steps = report.steps,
            reconciles = report.reconciles,
            errors = report.reconcile_errors,
            violations = report.violations.len(),
            "simulation finished"
        );
        report
    }
}
