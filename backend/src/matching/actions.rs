//! Participant actions consumed at the hiring barriers

use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};

/// An employer's move in one hiring round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmployerAction {
    /// Make a binding offer to an eligible worker
    Offer {
        worker: ParticipantId,
        wage: i64,
        training: bool,
    },
    /// Make no further offers this period
    Withdraw,
}

/// A worker's decision on the open offers of one hiring round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "employer", rename_all = "snake_case")]
pub enum WorkerChoice {
    /// Accept the offer from this employer; all other open offers are rejected
    Accept(ParticipantId),
    /// Reject every open offer
    RejectAll,
}

impl WorkerChoice {
    /// Decode the form convention: an employer id, or 0 for reject-all
    ///
    /// # Example
    /// ```
    /// use labor_market_core::matching::WorkerChoice;
    ///
    /// assert_eq!(WorkerChoice::from_choice_id(0), WorkerChoice::RejectAll);
    /// assert_eq!(WorkerChoice::from_choice_id(2), WorkerChoice::Accept(2));
    /// assert_eq!(WorkerChoice::Accept(2).choice_id(), 2);
    /// ```
    pub fn from_choice_id(id: ParticipantId) -> Self {
        if id == 0 {
            WorkerChoice::RejectAll
        } else {
            WorkerChoice::Accept(id)
        }
    }

    pub fn choice_id(self) -> ParticipantId {
        match self {
            WorkerChoice::Accept(employer) => employer,
            WorkerChoice::RejectAll => 0,
        }
    }
}
