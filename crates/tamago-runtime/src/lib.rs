//! Tamago Runtime - Controller orchestration
//!
//! This crate drives the reconciler against a store:
//! - Work queue with deduplication, delayed requeue and error backoff
//! - Informer feeding store notifications into the queue
//! - Worker pool running reconciliation passes
//! - Configuration loading and tracing setup
//! - Operator console for the `tamagod` daemon

pub mod config;
pub mod queue;
pub mod informer;
pub mod controller;
pub mod seed;
pub mod telemetry;
pub mod console;

pub use config::*;
pub use queue::*;
pub use informer::*;
pub use controller::*;
pub use seed::*;
pub use telemetry::*;
pub use console::*;
