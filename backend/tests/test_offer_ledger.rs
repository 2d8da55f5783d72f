//! Offer Ledger Tests
//!
//! Critical invariants tested:
//! - Unique (period, round, employer, worker) key
//! - Exclusion: a rejected pair cannot trade again in the same period
//! - Single contract per participant per period
//! - Append-only ids, re-checked when rebuilding from stored offers

use labor_market_core::{LedgerError, Offer, OfferFilter, OfferId, OfferLedger, OfferStatus};

// ============================================================================
// Test Helpers
// ============================================================================

/// Two employers (1, 2) and three workers (3, 4, 5) trading over two periods
fn populated_ledger() -> OfferLedger {
    let mut ledger = OfferLedger::new();

    // Period 1, round 1
    let a = ledger.create(1, 1, 1, 3, 200, false).unwrap();
    let b = ledger.create(1, 1, 2, 3, 250, true).unwrap();
    ledger.accept(b).unwrap();
    ledger.reject(a).unwrap();

    // Period 1, round 2
    let c = ledger.create(1, 2, 1, 4, 180, false).unwrap();
    ledger.reject(c).unwrap();

    // Period 2, round 1
    let d = ledger.create(2, 1, 1, 3, 220, false).unwrap();
    ledger.accept(d).unwrap();
    ledger.create(2, 1, 2, 5, 300, true).unwrap();

    ledger
}

// ============================================================================
// Creation and keys
// ============================================================================

#[test]
fn test_ids_follow_creation_order() {
    let ledger = populated_ledger();
    let ids: Vec<OfferId> = ledger.offers().iter().map(|o| o.id()).collect();
    assert_eq!(ids, (0..5).map(OfferId).collect::<Vec<_>>());
    assert_eq!(ledger.get(OfferId(4)).unwrap().wage(), 300);
    assert!(ledger.get(OfferId(5)).is_none());
}

#[test]
fn test_duplicate_key_rejected() {
    let mut ledger = OfferLedger::new();
    ledger.create(1, 1, 1, 3, 200, false).unwrap();

    assert_eq!(
        ledger.create(1, 1, 1, 3, 400, true),
        Err(LedgerError::DuplicateOffer {
            period: 1,
            round: 1,
            employer: 1,
            worker: 3
        })
    );
    assert_eq!(ledger.len(), 1);

    // Same pair in a later round is a different key
    assert!(ledger.create(1, 2, 1, 3, 400, true).is_ok());
}

#[test]
fn test_rejection_excludes_pair_for_rest_of_period() {
    let mut ledger = populated_ledger();

    assert!(ledger.is_excluded(1, 1, 3));
    assert!(ledger.is_excluded(1, 1, 4));
    assert!(!ledger.is_excluded(1, 2, 3));
    assert!(!ledger.is_excluded(2, 1, 4));

    assert_eq!(
        ledger.create(1, 3, 1, 3, 500, false),
        Err(LedgerError::ExcludedPair {
            period: 1,
            employer: 1,
            worker: 3
        })
    );
    // A new period lifts the exclusion
    assert!(ledger.create(3, 1, 1, 4, 500, false).is_ok());
}

#[test]
fn test_resolved_offers_cannot_change() {
    let mut ledger = populated_ledger();

    assert!(matches!(
        ledger.accept(OfferId(0)),
        Err(LedgerError::Offer(_))
    ));
    assert!(matches!(
        ledger.reject(OfferId(1)),
        Err(LedgerError::Offer(_))
    ));
    assert_eq!(
        ledger.accept(OfferId(42)),
        Err(LedgerError::UnknownOffer(OfferId(42)))
    );
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_filters_compose() {
    let ledger = populated_ledger();

    let rejected_p1: Vec<OfferId> = ledger
        .filter(OfferFilter::new().period(1).status(OfferStatus::Rejected))
        .map(|o| o.id())
        .collect();
    assert_eq!(rejected_p1, vec![OfferId(0), OfferId(2)]);

    assert_eq!(ledger.filter(OfferFilter::new().employer(2)).count(), 2);
    assert_eq!(ledger.filter(OfferFilter::new().period(1).round(2)).count(), 1);
    assert_eq!(ledger.filter(OfferFilter::new().worker(3)).count(), 3);
    assert_eq!(ledger.filter(OfferFilter::new()).count(), ledger.len());
}

#[test]
fn test_open_offers_for_worker() {
    let ledger = populated_ledger();

    let open = ledger.open_offers_for(2, 5);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].employer(), 2);
    assert!(ledger.open_offers_for(1, 3).is_empty());
}

#[test]
fn test_contract_lookup() {
    let ledger = populated_ledger();

    let worker_contract = ledger.contract_for(1, 3).unwrap().unwrap();
    assert_eq!(worker_contract.employer(), 2);
    assert!(worker_contract.training());

    assert_eq!(ledger.contract_for(1, 2).unwrap().unwrap().id(), OfferId(1));
    assert!(ledger.contract_for(1, 1).unwrap().is_none());
    assert_eq!(ledger.contract_for(2, 1).unwrap().unwrap().worker(), 3);
    assert_eq!(ledger.accepted_count(1), 1);
    assert_eq!(ledger.accepted_count(2), 1);
}

#[test]
fn test_history_is_most_recent_first_and_bounded_by_period() {
    let ledger = populated_ledger();

    let through_p1: Vec<OfferId> = ledger.history_for(1, 1).iter().map(|o| o.id()).collect();
    assert_eq!(through_p1, vec![OfferId(2), OfferId(0)]);

    let through_p2: Vec<OfferId> = ledger.history_for(1, 2).iter().map(|o| o.id()).collect();
    assert_eq!(through_p2, vec![OfferId(3), OfferId(2), OfferId(0)]);

    let worker: Vec<OfferId> = ledger.history_for(3, 2).iter().map(|o| o.id()).collect();
    assert_eq!(worker, vec![OfferId(3), OfferId(1), OfferId(0)]);
}

// ============================================================================
// Single-contract invariant
// ============================================================================

#[test]
fn test_double_acceptance_detected() {
    let mut ledger = OfferLedger::new();
    let a = ledger.create(1, 1, 1, 3, 200, false).unwrap();
    let b = ledger.create(1, 1, 2, 3, 210, false).unwrap();
    ledger.accept(a).unwrap();
    ledger.accept(b).unwrap();

    assert_eq!(
        ledger.verify_period(1),
        Err(LedgerError::MultipleContracts {
            participant: 3,
            period: 1,
            count: 2
        })
    );
    assert!(matches!(
        ledger.contract_for(1, 3),
        Err(LedgerError::MultipleContracts { count: 2, .. })
    ));
    // Each employer still holds exactly one contract
    assert!(ledger.contract_for(1, 1).is_ok());
}

// ============================================================================
// Rebuilding
// ============================================================================

#[test]
fn test_rebuild_from_offers_restores_indexes() {
    let ledger = populated_ledger();
    let rebuilt = OfferLedger::from_offers(ledger.offers().to_vec()).unwrap();

    assert_eq!(rebuilt, ledger);
    assert!(rebuilt.is_excluded(1, 1, 3));
}

#[test]
fn test_rebuild_refuses_gaps_in_ids() {
    let mut offers = populated_ledger().offers().to_vec();
    offers.remove(1);

    assert_eq!(
        OfferLedger::from_offers(offers),
        Err(LedgerError::OutOfSequence {
            position: 1,
            found: OfferId(2)
        })
    );
}

#[test]
fn test_rebuild_refuses_offer_to_excluded_pair() {
    let mut offers = populated_ledger().offers().to_vec();
    // Employer 1 was rejected by worker 3 in period 1 round 1
    offers.push(Offer::new(OfferId(5), 1, 3, 1, 3, 999, false));

    assert_eq!(
        OfferLedger::from_offers(offers),
        Err(LedgerError::ExcludedPair {
            period: 1,
            employer: 1,
            worker: 3
        })
    );
}
