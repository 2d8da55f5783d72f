//! Market State
//!
//! The group of participants taking part in a session, keyed by id.
//!
//! # Critical Invariants
//!
//! 1. **Id Uniqueness**: each participant id appears exactly once
//! 2. **Fixed Roles**: the role of every participant is set at construction
//!    and never changes
//! 3. **Symmetric Matches**: if A is matched with B then B is matched with A

use crate::models::participant::{Participant, ParticipantError, ParticipantId, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All participants of one market group
///
/// # Example
///
/// ```rust
/// use labor_market_core::{MarketState, Participant, Role};
///
/// let state = MarketState::new(vec![
///     Participant::new(1, Role::Employer, "Acme".to_string()).unwrap(),
///     Participant::new(2, Role::Worker, "Sam".to_string()).unwrap(),
/// ])
/// .unwrap();
/// assert_eq!(state.employers(), vec![1]);
/// assert_eq!(state.workers(), vec![2]);
/// assert_eq!(state.role_of(2), Some(Role::Worker));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    participants: BTreeMap<ParticipantId, Participant>,
}

impl MarketState {
    /// Create the group
    ///
    /// # Panics
    ///
    /// Panics if two participants share an id
    pub fn new(participants: Vec<Participant>) -> Result<Self, ParticipantError> {
        let mut map = BTreeMap::new();
        for participant in participants {
            let id = participant.id();
            if map.insert(id, participant).is_some() {
                return Err(ParticipantError::DuplicateId(id));
            }
        }
        Ok(Self { participants: map })
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    pub fn role_of(&self, id: ParticipantId) -> Option<Role> {
        self.participants.get(&id).map(Participant::role)
    }

    /// All participants in id order
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.participants.keys().copied().collect()
    }

    /// Ids of all participants with the given role, in id order
    pub fn with_role(&self, role: Role) -> Vec<ParticipantId> {
        self.participants
            .values()
            .filter(|p| p.role() == role)
            .map(Participant::id)
            .collect()
    }

    pub fn employers(&self) -> Vec<ParticipantId> {
        self.with_role(Role::Employer)
    }

    pub fn workers(&self) -> Vec<ParticipantId> {
        self.with_role(Role::Worker)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Number of matched employer/worker pairs
    pub fn matched_pairs(&self) -> usize {
        self.participants
            .values()
            .filter(|p| p.role().is_employer() && p.is_matched())
            .count()
    }

    /// Clear per-period fields of every participant
    pub(crate) fn reset_for_period(&mut self) {
        for participant in self.participants.values_mut() {
            participant.reset_for_period();
        }
    }

    /// Check that match pointers are symmetric and cross roles
    pub fn matches_consistent(&self) -> bool {
        self.participants.values().all(|p| match p.matched_with() {
            None => true,
            Some(other) => self.participants.get(&other).is_some_and(|o| {
                o.matched_with() == Some(p.id()) && o.role() == p.role().counterpart()
            }),
        })
    }
}
