//! Error types for Tamago

use thiserror::Error;

use crate::{PetKey, ResourceVersion};

/// Core Tamago errors
#[derive(Error, Debug)]
pub enum TamagoError {
    // Store errors
    #[error("Pet not found: {0}")]
    NotFound(PetKey),

    #[error("Pet already exists: {0}")]
    AlreadyExists(PetKey),

    #[error("Conflict on {key}: expected version {expected}, found {actual}")]
    Conflict {
        key: PetKey,
        expected: ResourceVersion,
        actual: ResourceVersion,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store not synced: {0}")]
    NotSynced(String),

    // Reconcile errors
    #[error("Malformed delta on {key}: {delta_key}={value:?} is not an integer")]
    MalformedDelta {
        key: PetKey,
        delta_key: String,
        value: String,
    },

    #[error("Retries exhausted on {key} after {attempts} attempts")]
    RetriesExhausted { key: PetKey, attempts: u32 },

    // Runtime errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TamagoError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, TamagoError::NotFound(_))
    }

    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, TamagoError::Conflict { .. })
    }
}

/// Result type for Tamago operations
pub type TamagoResult<T> = Result<T, TamagoError>;
