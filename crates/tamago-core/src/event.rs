//! Lifecycle events
//!
//! Events are advisory signals raised when a decay pass leaves a pet in a
//! noteworthy state. At most one event is raised per pass.

use std::fmt;

use crate::{PetKey, Timestamp, NEEDS_FOOD_THRESHOLD};

/// Event severity. Every lifecycle condition is a warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "Warning",
        }
    }
}

/// Why a lifecycle event was raised
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleReason {
    /// Food reached zero
    Dead,
    /// Love reached zero
    NeedsLove,
    /// Food fell below the NeedsFood threshold
    NeedsFood,
}

impl LifecycleReason {
    /// Pick the event for counters after a decay pass.
    ///
    /// Priority is Dead, then NeedsLove, then NeedsFood.
    pub fn evaluate(food: i64, love: i64) -> Option<LifecycleReason> {
        if food <= 0 {
            Some(LifecycleReason::Dead)
        } else if love <= 0 {
            Some(LifecycleReason::NeedsLove)
        } else if food < NEEDS_FOOD_THRESHOLD {
            Some(LifecycleReason::NeedsFood)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleReason::Dead => "Dead",
            LifecycleReason::NeedsLove => "NeedsLove",
            LifecycleReason::NeedsFood => "NeedsFood",
        }
    }

    pub fn severity(self) -> Severity {
        Severity::Warning
    }

    /// Human readable message for a pet with the given nickname
    pub fn message(self, nickname: &str) -> String {
        match self {
            LifecycleReason::Dead => format!("{} died", nickname),
            LifecycleReason::NeedsLove => format!("{} needs love and attention", nickname),
            LifecycleReason::NeedsFood => format!("{} needs food", nickname),
        }
    }
}

impl fmt::Display for LifecycleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event attached to a pet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub key: PetKey,
    pub severity: Severity,
    pub reason: LifecycleReason,
    pub message: String,
    pub at: Timestamp,
}

impl LifecycleEvent {
    pub fn new(key: PetKey, reason: LifecycleReason, nickname: &str, at: Timestamp) -> Self {
        LifecycleEvent {
            key,
            severity: reason.severity(),
            reason,
            message: reason.message(nickname),
            at,
        }
    }
}
