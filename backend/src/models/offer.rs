//! Offer model
//!
//! Represents a binding wage offer from an employer to a worker.
//! Each offer has:
//! - Period and hiring round in which it was made
//! - Employer and worker ids
//! - Wage (i64 points) and training flag
//! - Status (Open, Accepted, Rejected)
//!
//! An offer leaves `Open` exactly once and never returns to it.
//!
//! CRITICAL: All money values are i64 (points)

use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Offer identifier: position in the session's offer ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OfferId(pub usize);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offer_{:05}", self.0)
    }
}

/// Offer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    /// Waiting for the worker's decision this round
    Open,
    /// Accepted by the worker; the offer is now a contract
    Accepted,
    /// Rejected by the worker (explicitly, by timeout, or because another
    /// offer was accepted)
    Rejected,
}

/// Errors that can occur during offer status transitions
#[derive(Debug, Error, PartialEq)]
pub enum OfferError {
    #[error("Offer {id} is already {status:?}")]
    AlreadyResolved { id: OfferId, status: OfferStatus },
}

/// A wage offer from an employer to a worker
///
/// # Example
/// ```
/// use labor_market_core::{Offer, OfferId, OfferStatus};
///
/// let mut offer = Offer::new(OfferId(0), 1, 1, 1, 4, 250, true);
/// assert!(offer.is_open());
///
/// offer.accept().unwrap();
/// assert_eq!(offer.status(), OfferStatus::Accepted);
/// assert!(offer.reject().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    id: OfferId,

    /// Period in which the offer was made
    period: usize,

    /// Hiring round (within the period) in which the offer was made
    round: usize,

    employer: ParticipantId,
    worker: ParticipantId,

    /// Offered wage (i64 points)
    wage: i64,

    /// Whether the contract includes training
    training: bool,

    status: OfferStatus,
}

impl Offer {
    /// Create a new open offer
    ///
    /// # Panics
    /// Panics if the wage is not positive or `period`/`round` is zero
    pub fn new(
        id: OfferId,
        period: usize,
        round: usize,
        employer: ParticipantId,
        worker: ParticipantId,
        wage: i64,
        training: bool,
    ) -> Self {
        assert!(wage > 0, "wage must be positive");
        assert!(period > 0 && round > 0, "period and round are 1-based");

        Self {
            id,
            period,
            round,
            employer,
            worker,
            wage,
            training,
            status: OfferStatus::Open,
        }
    }

    pub fn id(&self) -> OfferId {
        self.id
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn employer(&self) -> ParticipantId {
        self.employer
    }

    pub fn worker(&self) -> ParticipantId {
        self.worker
    }

    /// Get offered wage (i64 points)
    pub fn wage(&self) -> i64 {
        self.wage
    }

    pub fn training(&self) -> bool {
        self.training
    }

    pub fn status(&self) -> OfferStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == OfferStatus::Open
    }

    pub fn is_accepted(&self) -> bool {
        self.status == OfferStatus::Accepted
    }

    pub fn is_rejected(&self) -> bool {
        self.status == OfferStatus::Rejected
    }

    /// Whether the offer involves the participant on either side
    pub fn involves(&self, participant: ParticipantId) -> bool {
        self.employer == participant || self.worker == participant
    }

    /// Counterpart of `participant` in this offer, if they are a party to it
    pub fn counterpart_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        if self.employer == participant {
            Some(self.worker)
        } else if self.worker == participant {
            Some(self.employer)
        } else {
            None
        }
    }

    /// Transition Open → Accepted
    pub fn accept(&mut self) -> Result<(), OfferError> {
        self.resolve(OfferStatus::Accepted)
    }

    /// Transition Open → Rejected
    pub fn reject(&mut self) -> Result<(), OfferError> {
        self.resolve(OfferStatus::Rejected)
    }

    fn resolve(&mut self, status: OfferStatus) -> Result<(), OfferError> {
        if self.status != OfferStatus::Open {
            return Err(OfferError::AlreadyResolved {
                id: self.id,
                status: self.status,
            });
        }
        self.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Offer {
        Offer::new(OfferId(7), 2, 1, 1, 4, 100, false)
    }

    #[test]
    fn test_new_offer_is_open() {
        let offer = sample();
        assert!(offer.is_open());
        assert_eq!(offer.id().to_string(), "offer_00007");
    }

    #[test]
    fn test_reject_is_final() {
        let mut offer = sample();
        offer.reject().unwrap();
        assert!(offer.is_rejected());

        assert_eq!(
            offer.accept(),
            Err(OfferError::AlreadyResolved {
                id: OfferId(7),
                status: OfferStatus::Rejected
            })
        );
        assert!(offer.is_rejected());
    }

    #[test]
    fn test_counterpart_of() {
        let offer = sample();
        assert_eq!(offer.counterpart_of(1), Some(4));
        assert_eq!(offer.counterpart_of(4), Some(1));
        assert_eq!(offer.counterpart_of(2), None);
    }

    #[test]
    #[should_panic(expected = "wage must be positive")]
    fn test_zero_wage_panics() {
        Offer::new(OfferId(0), 1, 1, 1, 2, 0, false);
    }
}
