//! Pet records
//!
//! A pet record is the unit of reconciliation. `spec` is the desired
//! configuration written by users, `status` is the observed state owned by
//! the reconciler, and `pending_deltas` carries transient feed/pet requests
//! from clients.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{humantime_duration, PetKey, ResourceVersion, TamagoError, TamagoResult, Timestamp};

/// Lower bound of food and love
pub const VITALITY_MIN: i64 = 0;
/// Upper bound of food and love
pub const VITALITY_MAX: i64 = 100;
/// Food below this level (and above zero) raises a NeedsFood event
pub const NEEDS_FOOD_THRESHOLD: i64 = 30;

/// Pending delta key for food requests
pub const FEED_DELTA_KEY: &str = "tamago.dev/feed";
/// Pending delta key for love requests
pub const PET_DELTA_KEY: &str = "tamago.dev/pet";

pub const DEFAULT_DECAY_RATE: u32 = 1;
pub const DEFAULT_DECAY_INTERVAL: Duration = Duration::from_secs(10);

/// Clamp a counter into `[VITALITY_MIN, VITALITY_MAX]`
#[inline]
pub fn clamp_vitality(value: i64) -> i64 {
    value.clamp(VITALITY_MIN, VITALITY_MAX)
}

/// Desired configuration of a pet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetSpec {
    pub nickname: String,
    /// Amount removed from food on every decay pass
    #[serde(default = "default_decay_rate")]
    pub food_decay_rate: u32,
    /// Amount removed from love on every decay pass
    #[serde(default = "default_decay_rate")]
    pub love_decay_rate: u32,
    /// Interval between decay passes
    #[serde(default = "default_decay_interval", with = "humantime_duration")]
    pub decay_interval: Duration,
}

fn default_decay_rate() -> u32 {
    DEFAULT_DECAY_RATE
}

fn default_decay_interval() -> Duration {
    DEFAULT_DECAY_INTERVAL
}

impl PetSpec {
    pub fn new(nickname: impl Into<String>) -> Self {
        PetSpec {
            nickname: nickname.into(),
            food_decay_rate: DEFAULT_DECAY_RATE,
            love_decay_rate: DEFAULT_DECAY_RATE,
            decay_interval: DEFAULT_DECAY_INTERVAL,
        }
    }

    pub fn with_decay_rates(mut self, food: u32, love: u32) -> Self {
        self.food_decay_rate = food;
        self.love_decay_rate = love;
        self
    }

    pub fn with_decay_interval(mut self, interval: Duration) -> Self {
        self.decay_interval = interval;
        self
    }
}

/// Observed state of a pet
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetStatus {
    #[serde(default)]
    pub food: i64,
    #[serde(default)]
    pub love: i64,
    /// Last time a food delta was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fed_time: Option<Timestamp>,
    /// Last time a love delta was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_time: Option<Timestamp>,
    /// Last time the reconciler initialized or decayed the counters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<Timestamp>,
    #[serde(default)]
    pub initialized: bool,
}

impl PetStatus {
    /// Both counters inside their bounds
    pub fn in_bounds(&self) -> bool {
        (VITALITY_MIN..=VITALITY_MAX).contains(&self.food)
            && (VITALITY_MIN..=VITALITY_MAX).contains(&self.love)
    }
}

/// The two counters a delta can target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Food,
    Love,
}

impl DeltaKind {
    pub const ALL: [DeltaKind; 2] = [DeltaKind::Food, DeltaKind::Love];

    /// Pending delta key carrying this kind
    #[inline]
    pub fn key(self) -> &'static str {
        match self {
            DeltaKind::Food => FEED_DELTA_KEY,
            DeltaKind::Love => PET_DELTA_KEY,
        }
    }
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaKind::Food => write!(f, "food"),
            DeltaKind::Love => write!(f, "love"),
        }
    }
}

/// Deltas parsed from a record's pending delta keys
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingDeltas {
    pub food: Option<i64>,
    pub love: Option<i64>,
}

impl PendingDeltas {
    pub fn get(&self, kind: DeltaKind) -> Option<i64> {
        match kind {
            DeltaKind::Food => self.food,
            DeltaKind::Love => self.love,
        }
    }

    /// True when applying these deltas would not change any counter
    pub fn is_noop(&self) -> bool {
        self.food.unwrap_or(0) == 0 && self.love.unwrap_or(0) == 0
    }
}

/// A pet record as stored in the object store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    #[serde(flatten)]
    pub key: PetKey,
    pub spec: PetSpec,
    #[serde(default)]
    pub status: PetStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pending_deltas: BTreeMap<String, String>,
    /// Assigned by the store; unset on records that were never written
    #[serde(default)]
    pub version: ResourceVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl Pet {
    /// New record with empty status
    pub fn new(key: PetKey, spec: PetSpec) -> Self {
        Pet {
            key,
            spec,
            status: PetStatus::default(),
            pending_deltas: BTreeMap::new(),
            version: ResourceVersion::UNSET,
            created_at: None,
        }
    }

    /// Check the spec constraints a store enforces on write
    pub fn validate(&self) -> TamagoResult<()> {
        if self.key.name.is_empty() || self.key.namespace.is_empty() {
            return Err(TamagoError::InvalidRecord(format!(
                "{:?}: namespace and name are required",
                self.key
            )));
        }
        if self.spec.decay_interval.is_zero() {
            return Err(TamagoError::InvalidRecord(format!(
                "{}: decayInterval must be positive",
                self.key
            )));
        }
        Ok(())
    }

    /// Record created but never brought to its starting vitality
    pub fn is_uninitialized(&self) -> bool {
        !self.status.initialized && self.status.food == 0 && self.status.love == 0
    }

    /// Either delta key is present
    pub fn has_pending_deltas(&self) -> bool {
        DeltaKind::ALL
            .iter()
            .any(|kind| self.pending_deltas.contains_key(kind.key()))
    }

    /// Raw value of a pending delta
    pub fn raw_delta(&self, kind: DeltaKind) -> Option<&str> {
        self.pending_deltas.get(kind.key()).map(String::as_str)
    }

    /// Parse the pending deltas, failing on the first non-integer value
    pub fn parse_deltas(&self) -> TamagoResult<PendingDeltas> {
        let mut deltas = PendingDeltas::default();
        for kind in DeltaKind::ALL {
            let Some(raw) = self.raw_delta(kind) else {
                continue;
            };
            let value = parse_delta(raw).ok_or_else(|| TamagoError::MalformedDelta {
                key: self.key.clone(),
                delta_key: kind.key().to_string(),
                value: raw.to_string(),
            })?;
            match kind {
                DeltaKind::Food => deltas.food = Some(value),
                DeltaKind::Love => deltas.love = Some(value),
            }
        }
        Ok(deltas)
    }

    /// Delta kinds whose value is present but not an integer
    pub fn malformed_deltas(&self) -> Vec<DeltaKind> {
        DeltaKind::ALL
            .into_iter()
            .filter(|kind| matches!(self.raw_delta(*kind), Some(raw) if parse_delta(raw).is_none()))
            .collect()
    }

    /// Remove the given delta keys, returning whether anything was removed
    pub fn clear_deltas(&mut self, kinds: &[DeltaKind]) -> bool {
        let mut removed = false;
        for kind in kinds {
            removed |= self.pending_deltas.remove(kind.key()).is_some();
        }
        removed
    }
}

/// Parse a signed integer delta
pub fn parse_delta(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pet() -> Pet {
        Pet::new(PetKey::named("mochi"), PetSpec::new("Mochi"))
    }

    #[test]
    fn test_spec_defaults_from_json() {
        let spec: PetSpec = serde_json::from_str(r#"{"nickname":"Mochi"}"#).unwrap();
        assert_eq!(spec.food_decay_rate, 1);
        assert_eq!(spec.love_decay_rate, 1);
        assert_eq!(spec.decay_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_spec_humantime_interval() {
        let spec: PetSpec = serde_json::from_str(
            r#"{"nickname":"Mochi","foodDecayRate":10,"decayInterval":"1m 30s"}"#,
        )
        .unwrap();
        assert_eq!(spec.food_decay_rate, 10);
        assert_eq!(spec.decay_interval, Duration::from_secs(90));
    }

    #[test]
    fn test_negative_decay_rate_rejected() {
        let spec = serde_json::from_str::<PetSpec>(r#"{"nickname":"Mochi","foodDecayRate":-1}"#);
        assert!(spec.is_err());
    }

    #[test]
    fn test_pet_json_layout() {
        let json = r#"{
            "namespace": "zoo",
            "name": "mochi",
            "spec": {"nickname": "Mochi"},
            "pendingDeltas": {"tamago.dev/feed": "20"}
        }"#;
        let pet: Pet = serde_json::from_str(json).unwrap();
        assert_eq!(pet.key, PetKey::new("zoo", "mochi"));
        assert!(pet.is_uninitialized());
        assert_eq!(pet.parse_deltas().unwrap().food, Some(20));
    }

    #[test]
    fn test_uninitialized_requires_zero_counters() {
        let mut pet = pet();
        assert!(pet.is_uninitialized());
        pet.status.food = 5;
        assert!(!pet.is_uninitialized());
        pet.status.food = 0;
        pet.status.initialized = true;
        assert!(!pet.is_uninitialized());
    }

    #[test]
    fn test_pending_deltas_signed() {
        let mut pet = pet();
        pet.pending_deltas.insert(FEED_DELTA_KEY.into(), "-15".into());
        pet.pending_deltas.insert(PET_DELTA_KEY.into(), "+7".into());
        let deltas = pet.parse_deltas().unwrap();
        assert_eq!(deltas.food, Some(-15));
        assert_eq!(deltas.love, Some(7));
        assert!(!deltas.is_noop());
    }

    #[test]
    fn test_malformed_delta() {
        let mut pet = pet();
        pet.pending_deltas.insert(FEED_DELTA_KEY.into(), "lots".into());
        pet.pending_deltas.insert(PET_DELTA_KEY.into(), "3".into());

        match pet.parse_deltas() {
            Err(TamagoError::MalformedDelta { delta_key, value, .. }) => {
                assert_eq!(delta_key, FEED_DELTA_KEY);
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(pet.malformed_deltas(), vec![DeltaKind::Food]);
    }

    #[test]
    fn test_clear_deltas_leaves_foreign_keys() {
        let mut pet = pet();
        pet.pending_deltas.insert(FEED_DELTA_KEY.into(), "0".into());
        pet.pending_deltas.insert("owner".into(), "kim".into());

        assert!(pet.has_pending_deltas());
        assert!(pet.clear_deltas(&DeltaKind::ALL));
        assert!(!pet.has_pending_deltas());
        assert_eq!(pet.pending_deltas.get("owner").map(String::as_str), Some("kim"));
        assert!(!pet.clear_deltas(&DeltaKind::ALL));
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut pet = pet();
        assert!(pet.validate().is_ok());
        pet.spec.decay_interval = Duration::ZERO;
        assert!(pet.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_clamp_vitality_in_bounds(value in any::<i64>()) {
            let clamped = clamp_vitality(value);
            prop_assert!((VITALITY_MIN..=VITALITY_MAX).contains(&clamped));
            if (VITALITY_MIN..=VITALITY_MAX).contains(&value) {
                prop_assert_eq!(clamped, value);
            }
        }
    }
}
