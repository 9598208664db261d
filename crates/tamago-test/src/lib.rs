//! Tamago Test Harness - Chaos testing and reconciler validation
//!
//! This crate provides:
//! - A chaos store that injects write conflicts, store errors and latency
//! - A harness driving a reconciler on a manual clock
//! - A seeded simulation checking vitality invariants over long runs

pub mod chaos;
pub mod harness;
pub mod simulation;

pub use chaos::*;
pub use harness::*;
pub use simulation::*;
