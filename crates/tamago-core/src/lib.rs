//! Tamago Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every Tamago crate:
//! - Identifiers (PetKey, ResourceVersion)
//! - Time primitives (Timestamp, Clock)
//! - Pet records (spec, status, pending deltas)
//! - Lifecycle events
//! - Error taxonomy

pub mod id;
pub mod time;
pub mod pet;
pub mod event;
pub mod error;

pub use id::*;
pub use time::*;
pub use pet::*;
pub use event::*;
pub use error::*;
