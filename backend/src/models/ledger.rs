//! Offer Ledger
//!
//! Append-only record of every offer made during a session. The ledger is
//! the sole owner of [`Offer`] values; everything else refers to offers by
//! [`OfferId`].
//!
//! # Critical Invariants
//!
//! 1. **Unique Key**: at most one offer per (period, round, employer, worker)
//! 2. **Exclusion**: once employer E's offer to worker W is rejected in
//!    period P, no further E→W offer can be created in P
//! 3. **Single Contract**: a participant has at most one accepted offer per
//!    period
//! 4. **Append Only**: offers are never removed; `OfferId(n)` is the n-th
//!    offer ever created

use crate::models::offer::{Offer, OfferError, OfferId, OfferStatus};
use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised by ledger operations
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Offer from {employer} to {worker} already exists for period {period} round {round}")]
    DuplicateOffer {
        period: usize,
        round: usize,
        employer: ParticipantId,
        worker: ParticipantId,
    },

    #[error("Worker {worker} rejected employer {employer} in period {period}; no further offers allowed")]
    ExcludedPair {
        period: usize,
        employer: ParticipantId,
        worker: ParticipantId,
    },

    #[error("Unknown offer {0}")]
    UnknownOffer(OfferId),

    #[error("Participant {participant} has {count} accepted offers in period {period}")]
    MultipleContracts {
        participant: ParticipantId,
        period: usize,
        count: usize,
    },

    #[error("Offer {found} is stored at position {position}")]
    OutOfSequence { position: usize, found: OfferId },

    #[error(transparent)]
    Offer(#[from] OfferError),
}

/// Filter for ledger queries; unset fields match everything
///
/// # Example
/// ```
/// use labor_market_core::{OfferFilter, OfferStatus};
///
/// let filter = OfferFilter::new().period(1).employer(2).status(OfferStatus::Rejected);
/// assert_eq!(filter, OfferFilter::new().status(OfferStatus::Rejected).employer(2).period(1));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferFilter {
    period: Option<usize>,
    round: Option<usize>,
    employer: Option<ParticipantId>,
    worker: Option<ParticipantId>,
    status: Option<OfferStatus>,
}

impl OfferFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn period(mut self, period: usize) -> Self {
        self.period = Some(period);
        self
    }

    pub fn round(mut self, round: usize) -> Self {
        self.round = Some(round);
        self
    }

    pub fn employer(mut self, employer: ParticipantId) -> Self {
        self.employer = Some(employer);
        self
    }

    pub fn worker(mut self, worker: ParticipantId) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn status(mut self, status: OfferStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether an offer passes every set criterion
    pub fn matches(&self, offer: &Offer) -> bool {
        self.period.map_or(true, |p| offer.period() == p)
            && self.round.map_or(true, |r| offer.round() == r)
            && self.employer.map_or(true, |e| offer.employer() == e)
            && self.worker.map_or(true, |w| offer.worker() == w)
            && self.status.map_or(true, |s| offer.status() == s)
    }
}

/// Append-only offer store with secondary indexes
///
/// # Example
///
/// ```rust
/// use labor_market_core::OfferLedger;
///
/// let mut ledger = OfferLedger::new();
/// let id = ledger.create(1, 1, 1, 3, 120, false).unwrap();
/// ledger.reject(id).unwrap();
///
/// assert!(ledger.is_excluded(1, 1, 3));
/// assert!(ledger.create(1, 2, 1, 3, 150, false).is_err());
/// assert!(ledger.create(2, 1, 1, 3, 150, false).is_ok()); // new period
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferLedger {
    offers: Vec<Offer>,

    /// (period, round, employer, worker) of every offer
    keys: BTreeSet<(usize, usize, ParticipantId, ParticipantId)>,

    /// (period, employer, worker) of every rejected offer
    excluded: BTreeSet<(usize, ParticipantId, ParticipantId)>,
}

impl OfferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from stored offers, re-checking every invariant
    ///
    /// Used when restoring a checkpoint.
    pub fn from_offers(offers: Vec<Offer>) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for (position, offer) in offers.into_iter().enumerate() {
            if offer.id() != OfferId(position) {
                return Err(LedgerError::OutOfSequence {
                    position,
                    found: offer.id(),
                });
            }
            ledger.check_insertable(offer.period(), offer.round(), offer.employer(), offer.worker())?;
            ledger.index(&offer);
            ledger.offers.push(offer);
        }

        let periods: BTreeSet<usize> = ledger.offers.iter().map(|o| o.period()).collect();
        for period in periods {
            ledger.verify_period(period)?;
        }
        Ok(ledger)
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// All offers in creation order
    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn get(&self, id: OfferId) -> Option<&Offer> {
        self.offers.get(id.0)
    }

    /// Append a new open offer
    ///
    /// # Errors
    /// - `DuplicateOffer` if the (period, round, employer, worker) key exists
    /// - `ExcludedPair` if the worker already rejected this employer this period
    pub fn create(
        &mut self,
        period: usize,
        round: usize,
        employer: ParticipantId,
        worker: ParticipantId,
        wage: i64,
        training: bool,
    ) -> Result<OfferId, LedgerError> {
        self.check_insertable(period, round, employer, worker)?;

        let id = OfferId(self.offers.len());
        let offer = Offer::new(id, period, round, employer, worker, wage, training);
        self.index(&offer);
        self.offers.push(offer);
        Ok(id)
    }

    /// Transition an open offer to accepted
    pub fn accept(&mut self, id: OfferId) -> Result<&Offer, LedgerError> {
        let offer = self
            .offers
            .get_mut(id.0)
            .ok_or(LedgerError::UnknownOffer(id))?;
        offer.accept()?;
        Ok(offer)
    }

    /// Transition an open offer to rejected, excluding the pair for the period
    pub fn reject(&mut self, id: OfferId) -> Result<&Offer, LedgerError> {
        let offer = self
            .offers
            .get_mut(id.0)
            .ok_or(LedgerError::UnknownOffer(id))?;
        offer.reject()?;
        self.excluded
            .insert((offer.period(), offer.employer(), offer.worker()));
        Ok(offer)
    }

    /// Whether `worker` has rejected `employer` in `period`
    pub fn is_excluded(&self, period: usize, employer: ParticipantId, worker: ParticipantId) -> bool {
        self.excluded.contains(&(period, employer, worker))
    }

    /// Offers matching a filter, in creation order
    pub fn filter(&self, filter: OfferFilter) -> impl Iterator<Item = &Offer> + '_ {
        self.offers.iter().filter(move |offer| filter.matches(offer))
    }

    /// Open offers addressed to a worker in a period
    pub fn open_offers_for(&self, period: usize, worker: ParticipantId) -> Vec<&Offer> {
        let filter = OfferFilter::new()
            .period(period)
            .worker(worker)
            .status(OfferStatus::Open);
        self.filter(filter).collect()
    }

    /// The participant's contract for a period
    ///
    /// # Errors
    /// `MultipleContracts` if more than one accepted offer references the
    /// participant; this is never resolved by picking one.
    pub fn contract_for(
        &self,
        period: usize,
        participant: ParticipantId,
    ) -> Result<Option<&Offer>, LedgerError> {
        let mut accepted = self
            .offers
            .iter()
            .filter(|o| o.period() == period && o.is_accepted() && o.involves(participant));

        let first = accepted.next();
        let extra = accepted.count();
        if extra > 0 {
            return Err(LedgerError::MultipleContracts {
                participant,
                period,
                count: extra + 1,
            });
        }
        Ok(first)
    }

    /// All offers involving the participant up to and including `period`,
    /// most recent first
    pub fn history_for(&self, participant: ParticipantId, period: usize) -> Vec<&Offer> {
        self.offers
            .iter()
            .rev()
            .filter(|o| o.period() <= period && o.involves(participant))
            .collect()
    }

    /// Number of accepted offers in a period
    pub fn accepted_count(&self, period: usize) -> usize {
        self.offers
            .iter()
            .filter(|o| o.period() == period && o.is_accepted())
            .count()
    }

    /// Check the single-contract invariant for every participant in a period
    pub fn verify_period(&self, period: usize) -> Result<(), LedgerError> {
        let mut seen = BTreeSet::new();
        for offer in self
            .offers
            .iter()
            .filter(|o| o.period() == period && o.is_accepted())
        {
            for participant in [offer.employer(), offer.worker()] {
                if !seen.insert(participant) {
                    let count = self
                        .offers
                        .iter()
                        .filter(|o| o.period() == period && o.is_accepted() && o.involves(participant))
                        .count();
                    return Err(LedgerError::MultipleContracts {
                        participant,
                        period,
                        count,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_insertable(
        &self,
        period: usize,
        round: usize,
        employer: ParticipantId,
        worker: ParticipantId,
    ) -> Result<(), LedgerError> {
        if self.keys.contains(&(period, round, employer, worker)) {
            return Err(LedgerError::DuplicateOffer {
                period,
                round,
                employer,
                worker,
            });
        }
        if self.is_excluded(period, employer, worker) {
            return Err(LedgerError::ExcludedPair {
                period,
                employer,
                worker,
            });
        }
        Ok(())
    }

    fn index(&mut self, offer: &Offer) {
        self.keys.insert((
            offer.period(),
            offer.round(),
            offer.employer(),
            offer.worker(),
        ));
        if offer.is_rejected() {
            self.excluded
                .insert((offer.period(), offer.employer(), offer.worker()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_rejected() {
        let mut ledger = OfferLedger::new();
        ledger.create(1, 1, 1, 3, 100, false).unwrap();
        assert_eq!(
            ledger.create(1, 1, 1, 3, 200, true),
            Err(LedgerError::DuplicateOffer {
                period: 1,
                round: 1,
                employer: 1,
                worker: 3
            })
        );
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut ledger = OfferLedger::new();
        let a = ledger.create(1, 1, 1, 3, 100, false).unwrap();
        let b = ledger.create(1, 1, 2, 3, 100, false).unwrap();
        assert_eq!(a, OfferId(0));
        assert_eq!(b, OfferId(1));
    }

    #[test]
    fn test_contract_for_detects_double_acceptance() {
        let mut ledger = OfferLedger::new();
        let a = ledger.create(1, 1, 1, 3, 100, false).unwrap();
        let b = ledger.create(1, 1, 2, 3, 100, false).unwrap();
        ledger.accept(a).unwrap();
        ledger.accept(b).unwrap();

        assert_eq!(
            ledger.contract_for(1, 3),
            Err(LedgerError::MultipleContracts {
                participant: 3,
                period: 1,
                count: 2
            })
        );
        assert!(ledger.verify_period(1).is_err());
        // Employers each still hold exactly one
        assert_eq!(ledger.contract_for(1, 1).unwrap().map(|o| o.id()), Some(a));
    }

    #[test]
    fn test_from_offers_rebuilds_exclusions() {
        let mut ledger = OfferLedger::new();
        let id = ledger.create(1, 1, 1, 3, 100, false).unwrap();
        ledger.reject(id).unwrap();

        let rebuilt = OfferLedger::from_offers(ledger.offers().to_vec()).unwrap();
        assert!(rebuilt.is_excluded(1, 1, 3));
        assert_eq!(rebuilt, ledger);
    }

    #[test]
    fn test_from_offers_rejects_offer_after_exclusion() {
        let mut offers = vec![Offer::new(OfferId(0), 1, 1, 1, 3, 100, false)];
        offers[0].reject().unwrap();
        offers.push(Offer::new(OfferId(1), 1, 2, 1, 3, 100, false));

        assert_eq!(
            OfferLedger::from_offers(offers),
            Err(LedgerError::ExcludedPair {
                period: 1,
                employer: 1,
                worker: 3
            })
        );
    }

    #[test]
    fn test_history_is_reverse_chronological() {
        let mut ledger = OfferLedger::new();
        ledger.create(1, 1, 1, 3, 100, false).unwrap();
        ledger.create(1, 2, 1, 4, 110, false).unwrap();
        ledger.create(2, 1, 1, 3, 120, false).unwrap();

        let wages: Vec<i64> = ledger.history_for(1, 2).iter().map(|o| o.wage()).collect();
        assert_eq!(wages, vec![120, 110, 100]);

        let wages: Vec<i64> = ledger.history_for(1, 1).iter().map(|o| o.wage()).collect();
        assert_eq!(wages, vec![110, 100]);
    }
}
