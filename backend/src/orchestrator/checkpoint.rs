//! Checkpoint - Save/Load Session State
//!
//! Serializes the complete state of a [`Session`](super::Session) so a
//! session can be paused between barriers and resumed later, possibly in a
//! different process.
//!
//! # Critical Invariants
//!
//! - **Determinism**: a restored session given the same remaining actions
//!   ends in exactly the same state as the uninterrupted one
//! - **Ledger Integrity**: offers are re-inserted one by one on restore, so
//!   duplicate keys, offers to excluded pairs and double contracts are
//!   refused
//! - **Config Matching**: a snapshot can only be restored with the config it
//!   was taken with

use crate::core::time::PeriodClock;
use crate::matching::{MatchingEngine, RoundSummary};
use crate::models::event::EventLog;
use crate::models::offer::Offer;
use crate::models::outcome::OutcomeArena;
use crate::models::participant::ParticipantId;
use crate::models::state::MarketState;
use crate::orchestrator::engine::{ActiveBarrier, SessionPhase, SimulationError};
use crate::skills::SkillTracker;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// Snapshot Structure
// ============================================================================

/// Complete session state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// SHA256 hash of the session config (for validation)
    pub config_hash: String,

    pub phase: SessionPhase,
    pub clock: PeriodClock,
    pub state: MarketState,
    pub skills: SkillTracker,

    /// Every offer in creation order; the ledger indexes are rebuilt
    pub offers: Vec<Offer>,

    pub outcomes: OutcomeArena,
    pub matching: Option<MatchingEngine>,
    pub barrier: ActiveBarrier,
    pub efforts: BTreeMap<ParticipantId, u32>,
    pub rounds: Vec<RoundSummary>,

    /// RNG state at time of snapshot (CRITICAL for determinism)
    pub rng_state: u64,

    pub events: EventLog,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> Result<String, SimulationError> {
        serde_json::to_string(self).map_err(|e| {
            SimulationError::SerializationError(format!("Snapshot serialization failed: {}", e))
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        serde_json::from_str(json).map_err(|e| {
            SimulationError::SerializationError(format!("Snapshot deserialization failed: {}", e))
        })
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on field order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MarketConfig;

    #[test]
    fn test_config_hash_deterministic() {
        let hash1 = compute_config_hash(&MarketConfig::default()).unwrap();
        let hash2 = compute_config_hash(&MarketConfig::default()).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_config_hash_changes_with_config() {
        let base = MarketConfig::default();
        let other = MarketConfig {
            max_wage: base.max_wage + 1,
            ..base.clone()
        };
        assert_ne!(
            compute_config_hash(&base).unwrap(),
            compute_config_hash(&other).unwrap()
        );
    }
}
