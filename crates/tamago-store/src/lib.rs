//! Tamago Store - Object store client and concurrency primitives
//!
//! This crate provides:
//! - The object store client contract
//! - An in-memory versioned store with change notification
//! - Watch streams scoped to one key or to all keys
//! - The optimistic-concurrency retry protocol
//! - The delta request helper used by control clients

pub mod store;
pub mod watch;
pub mod memory;
pub mod retry;
pub mod client;

pub use store::*;
pub use watch::*;
pub use memory::*;
pub use retry::*;
pub use client::*;
