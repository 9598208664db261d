//! Tamago Reconcile - Pet reconciliation engine
//!
//! This crate implements the reconciliation engine:
//! - Phase classification of a fresh record
//! - One-time initialization
//! - Pending delta application
//! - Time-based decay
//! - Lifecycle event emission
//! - Requeue scheduling

pub mod config;
pub mod phase;
pub mod emitter;
pub mod initializer;
pub mod delta;
pub mod decay;
pub mod engine;

pub use config::*;
pub use phase::*;
pub use emitter::*;
pub use initializer::*;
pub use delta::*;
pub use decay::*;
pub use engine::*;
