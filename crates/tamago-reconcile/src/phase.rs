//! Phase classification
//!
//! Phases are evaluated in order and the first match wins:
//! Uninitialized, PendingDelta, Quiescent, Starved, Decay.
//! Missing is reported when the record could not be read at all.

use std::fmt;
use std::time::Duration;

use tamago_core::{elapsed_between, Pet, Timestamp};

/// Reconciliation phase of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Record not found; nothing to do until it is recreated
    Missing,
    /// Never initialized and both counters at zero
    Uninitialized,
    /// A feed or pet request is waiting
    PendingDelta,
    /// Decay interval has not elapsed yet
    Quiescent,
    /// Due for decay but food is already at zero
    Starved,
    /// Due for decay
    Decay,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Missing,
        Phase::Uninitialized,
        Phase::PendingDelta,
        Phase::Quiescent,
        Phase::Starved,
        Phase::Decay,
    ];

    /// Classify a freshly read record
    pub fn classify(pet: &Pet, now: Timestamp) -> Phase {
        if pet.is_uninitialized() {
            Phase::Uninitialized
        } else if pet.has_pending_deltas() {
            Phase::PendingDelta
        } else if !decay_due(pet, now) {
            Phase::Quiescent
        } else if pet.status.food <= 0 {
            Phase::Starved
        } else {
            Phase::Decay
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Missing => "missing",
            Phase::Uninitialized => "uninitialized",
            Phase::PendingDelta => "pending-delta",
            Phase::Quiescent => "quiescent",
            Phase::Starved => "starved",
            Phase::Decay => "decay",
        }
    }

    /// Index into [`Phase::ALL`]
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decay interval has elapsed since the last reconciler modification.
/// A record that was never modified is always due.
pub fn decay_due(pet: &Pet, now: Timestamp) -> bool {
    match pet.status.modified_time {
        Some(modified) => elapsed_between(modified, now) >= pet.spec.decay_interval,
        None => true,
    }
}

/// Time left until the record is due for decay, never more than the interval
pub fn until_next_decay(pet: &Pet, now: Timestamp) -> Duration {
    let interval = pet.spec.decay_interval;
    match pet.status.modified_time {
        Some(modified) => interval.saturating_sub(elapsed_between(modified, now)),
        None => Duration::ZERO,
    }
}
