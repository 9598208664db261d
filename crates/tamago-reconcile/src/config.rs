//! Reconciler configuration

use serde::{Deserialize, Serialize};

use tamago_store::RetryPolicy;

/// What to do with a pending delta that is not an integer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedDeltaPolicy {
    /// Leave the value in place for an operator to fix
    #[default]
    Retain,
    /// Remove the malformed key; well-formed deltas stay pending
    Discard,
}

/// Reconciler configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconcilerConfig {
    /// Retry policy for delta and decay writes
    pub write_retry: RetryPolicy,
    /// Retry policy for the initialization write
    pub init_retry: RetryPolicy,
    pub malformed_deltas: MalformedDeltaPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            write_retry: RetryPolicy::default(),
            init_retry: RetryPolicy::attempts(10),
            malformed_deltas: MalformedDeltaPolicy::Retain,
        }
    }
}

impl ReconcilerConfig {
    /// Configuration for heavily contended stores: more attempts, growing pauses
    pub fn contended() -> Self {
        let write_retry = RetryPolicy {
            max_attempts: 10,
            multiplier: 2.0,
            ..RetryPolicy::default()
        };
        ReconcilerConfig {
            init_retry: write_retry.clone(),
            write_retry,
            malformed_deltas: MalformedDeltaPolicy::Retain,
        }
    }

    pub fn with_malformed_deltas(mut self, policy: MalformedDeltaPolicy) -> Self {
        self.malformed_deltas = policy;
        self
    }
}
