//! Identity types for Tamago records
//!
//! A pet is addressed by namespace and name. The store stamps every
//! successful write with a fresh resource version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TamagoError;

/// Namespace used when a key is given without one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Pet key - the address of a record in the object store
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PetKey {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl PetKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        PetKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key in the default namespace
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAMESPACE, name)
    }
}

impl fmt::Debug for PetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pet({}/{})", self.namespace, self.name)
    }
}

impl fmt::Display for PetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for PetKey {
    type Err = TamagoError;

    /// Parses `namespace/name` or a bare `name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TamagoError::InvalidRecord(format!("invalid pet key: {s:?}"));
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(PetKey::new(ns, name))
            }
            Some(_) => Err(invalid()),
            None if !s.is_empty() => Ok(PetKey::named(s)),
            None => Err(invalid()),
        }
    }
}

/// Resource version - opaque token bumped by the store on every write
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVersion(pub u64);

impl ResourceVersion {
    /// Version of a record that has never been stored
    pub const UNSET: ResourceVersion = ResourceVersion(0);

    #[inline]
    pub fn new(v: u64) -> Self {
        ResourceVersion(v)
    }

    #[inline]
    pub fn is_set(self) -> bool {
        self != Self::UNSET
    }
}

impl fmt::Debug for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rv({})", self.0)
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
