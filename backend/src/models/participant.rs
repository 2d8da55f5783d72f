//! Participant model
//!
//! Represents one member of a market group. Each participant has:
//! - A numeric id (1-based, unique within the group)
//! - A role, fixed for the whole session
//! - A display label, assigned once in period 1 and carried forward
//! - Per-period hiring state: the match pointer and the hiring round counter
//!
//! Worker skill lives in [`crate::skills::SkillTracker`], not here, so the
//! skill invariants have a single owner.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Participant identifier within a group (1-based; 0 is never a valid id)
pub type ParticipantId = u32;

/// Errors raised when building a group
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParticipantError {
    #[error("Participant id 0 is reserved")]
    ReservedId,

    #[error("Participant ID {0} already exists")]
    DuplicateId(ParticipantId),
}

/// Role of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Employer,
    Worker,
}

impl Role {
    pub fn is_employer(self) -> bool {
        matches!(self, Role::Employer)
    }

    pub fn is_worker(self) -> bool {
        matches!(self, Role::Worker)
    }

    /// The role on the other side of a contract
    pub fn counterpart(self) -> Role {
        match self {
            Role::Employer => Role::Worker,
            Role::Worker => Role::Employer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Employer => write!(f, "Employer"),
            Role::Worker => write!(f, "Worker"),
        }
    }
}

/// Hiring-phase state of an employer within one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployerState {
    /// May still make offers
    Offering,
    /// Chose to make no further offers this period
    Withdrawn,
    /// Holds a contract with the given worker
    Matched(ParticipantId),
    /// Ran out of eligible workers or rounds
    Exhausted,
}

impl EmployerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, EmployerState::Offering)
    }
}

/// Hiring-phase state of a worker within one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Waiting for offers
    Awaiting,
    /// Holds a contract with the given employer
    Matched(ParticipantId),
    /// Hiring ended without a contract
    Exhausted,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkerState::Awaiting)
    }
}

/// A member of a market group
///
/// # Example
/// ```
/// use labor_market_core::{Participant, Role};
///
/// let employer = Participant::new(1, Role::Employer, "Acme".to_string()).unwrap();
/// assert!(employer.role().is_employer());
/// assert!(!employer.is_matched());
/// assert_eq!(employer.hiring_round(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    id: ParticipantId,
    role: Role,
    label: String,

    /// Counterpart of this period's contract, if any
    matched_with: Option<ParticipantId>,

    /// Hiring round this participant is in (1-based)
    hiring_round: usize,
}

impl Participant {
    /// Create a participant at the start of a session
    pub fn new(id: ParticipantId, role: Role, label: String) -> Result<Self, ParticipantError> {
        if id == 0 {
            return Err(ParticipantError::ReservedId);
        }
        Ok(Self {
            id,
            role,
            label,
            matched_with: None,
            hiring_round: 1,
        })
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matched_with(&self) -> Option<ParticipantId> {
        self.matched_with
    }

    pub fn is_matched(&self) -> bool {
        self.matched_with.is_some()
    }

    pub fn hiring_round(&self) -> usize {
        self.hiring_round
    }

    /// Clear the per-period fields; id, role and label carry over
    pub fn reset_for_period(&mut self) {
        self.matched_with = None;
        self.hiring_round = 1;
    }

    pub(crate) fn set_matched_with(&mut self, counterpart: ParticipantId) {
        self.matched_with = Some(counterpart);
    }

    pub(crate) fn set_hiring_round(&mut self, round: usize) {
        self.hiring_round = round;
    }
}
