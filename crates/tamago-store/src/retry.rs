//! Optimistic-concurrency retry protocol
//!
//! Every mutation follows the same loop: read the current record, compute
//! the change from that fresh read, then write it conditionally on the read's
//! version. A conflict discards the attempt and starts over from the read.
//! A missing record ends the loop as a no-op. Anything else is surfaced.
//!
//! The attempt bound only guards against livelock under contention.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use tamago_core::{humantime_duration, Pet, PetKey, TamagoError, TamagoResult};

use crate::ObjectStore;

/// Bounded retry with exponential backoff and jitter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Pause after the first conflict
    #[serde(with = "humantime_duration")]
    pub initial_backoff: Duration,
    /// Growth factor applied to the pause after each further conflict
    pub multiplier: f64,
    /// Upper bound on a single pause
    #[serde(with = "humantime_duration")]
    pub max_backoff: Duration,
    /// Random extra fraction added to each pause (0.1 = up to +10%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            multiplier: 1.0,
            max_backoff: Duration::from_secs(1),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Default timing with a different attempt bound
    pub fn attempts(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            ..Default::default()
        }
    }

    /// Retry immediately, without pausing
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            jitter: 0.0,
            ..Default::default()
        }
    }

    /// Reject timings that cannot produce a pause
    pub fn validate(&self) -> TamagoResult<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(TamagoError::Config(format!(
                "retry multiplier must be a finite number of at least 1, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(TamagoError::Config(format!(
                "retry jitter must be between 0 and 1, got {}",
                self.jitter
            )));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(TamagoError::Config(
                "retry initialBackoff exceeds maxBackoff".into(),
            ));
        }
        Ok(())
    }

    /// Pause before the attempt following failed attempt number `attempt` (1-based).
    ///
    /// Never exceeds `max_backoff` plus jitter, whatever the policy values.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exp);
        // NaN and infinity collapse to the cap
        let capped = base.min(self.max_backoff.as_secs_f64());

        let fraction = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let jitter = if fraction > 0.0 && capped > 0.0 {
            rand::thread_rng().gen_range(0.0..=fraction) * capped
        } else {
            0.0
        };

        Duration::try_from_secs_f64((capped + jitter).max(0.0)).unwrap_or(self.max_backoff)
    }
}

/// What a mutation step decided after looking at the fresh record
#[derive(Debug)]
pub enum Mutation<T> {
    /// Write this record conditionally on the version that was read
    Write(Pet, T),
    /// The record no longer calls for a write
    Abort(T),
}

/// Result of a retried update
#[derive(Debug)]
pub enum Commit<T> {
    Written {
        record: Pet,
        outcome: T,
        attempts: u32,
    },
    Aborted(T),
    /// The record was deleted before the write landed
    Gone,
}

impl<T> Commit<T> {
    /// The committed record, if a write happened
    pub fn record(&self) -> Option<&Pet> {
        match self {
            Commit::Written { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Commit::Written { .. })
    }
}

/// Run `mutate` under the retry protocol.
///
/// `mutate` always receives a freshly read record. Errors it returns abort
/// the loop without retrying.
pub async fn update_with_retry<S, T, F>(
    store: &S,
    key: &PetKey,
    policy: &RetryPolicy,
    mut mutate: F,
) -> TamagoResult<Commit<T>>
where
    S: ObjectStore,
    F: FnMut(&Pet) -> TamagoResult<Mutation<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let current = match store.get(key).await {
            Ok(pet) => pet,
            Err(e) if e.is_not_found() => return Ok(Commit::Gone),
            Err(e) => return Err(e),
        };

        let (record, outcome) = match mutate(&current)? {
            Mutation::Write(record, outcome) => (record, outcome),
            Mutation::Abort(outcome) => return Ok(Commit::Aborted(outcome)),
        };

        match store.conditional_write(&record, current.version).await {
            Ok(version) => {
                let mut record = record;
                record.version = version;
                return Ok(Commit::Written {
                    record,
                    outcome,
                    attempts: attempt,
                });
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(key = %key, attempt, "write conflict, retrying from a fresh read");
                if attempt < max_attempts {
                    let pause = policy.backoff(attempt);
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
            Err(e) if e.is_not_found() => return Ok(Commit::Gone),
            Err(e) => return Err(e),
        }
    }

    Err(TamagoError::RetriesExhausted {
        key: key.clone(),
        attempts: max_attempts,
    })
}
