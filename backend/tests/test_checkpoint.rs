//! Checkpoint Tests - Save/Load Session State
//!
//! Critical invariants tested:
//! - Determinism: a restored session finishes exactly like the original
//! - Barrier state: partial submissions survive a save/load
//! - Ledger integrity: tampered offer lists are refused on restore
//! - Config matching: reject state from a different config

use labor_market_core::matching::EmployerAction;
use labor_market_core::orchestrator::{
    compute_config_hash, ActionSource, RandomActions, Recorder, ScriptedActions, SessionSnapshot,
};
use labor_market_core::{
    Advance, LedgerError, MarketConfig, Offer, OfferId, Session, SessionPhase, SimulationError,
    SkillError,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config() -> MarketConfig {
    MarketConfig {
        num_periods: 3,
        rng_seed: 42,
        ..MarketConfig::default()
    }
}

/// Record a complete random run; returns the final session and its script
fn recorded_run(config: MarketConfig, seed: u64) -> (Session, ScriptedActions) {
    let mut session = Session::new(config).unwrap();
    let mut recorder = Recorder::new(RandomActions::new(seed, 0.15));
    session.run(&mut recorder).unwrap();
    (session, recorder.into_script())
}

/// Replay the script until the session waits in `stop`
fn play_until(session: &mut Session, script: &mut ScriptedActions, stop: SessionPhase) {
    loop {
        match session.advance().unwrap() {
            Advance::Waiting { phase, .. } if phase == stop => return,
            Advance::Waiting { pending, .. } => {
                for participant in pending {
                    let request = session.request_for(participant).unwrap();
                    match script.next_action(&request) {
                        Some(action) => session.submit(participant, action).unwrap(),
                        None => session.time_out(participant).unwrap(),
                    }
                }
            }
            Advance::Finished => panic!("session finished before reaching {:?}", stop),
        }
    }
}

fn save_and_load(session: &Session) -> Session {
    let json = session.snapshot().unwrap().to_json().unwrap();
    let snapshot = SessionSnapshot::from_json(&json).unwrap();
    Session::restore(session.config().clone(), snapshot).unwrap()
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_restored_session_finishes_identically() {
    let (original, script) = recorded_run(test_config(), 7);

    let stops = [
        SessionPhase::HiringOffers { period: 1, round: 1 },
        SessionPhase::Results { period: 1 },
        SessionPhase::HiringOffers { period: 2, round: 1 },
        SessionPhase::Results { period: 3 },
    ];

    for stop in stops {
        let mut replay = script.clone();
        let mut session = Session::new(test_config()).unwrap();
        play_until(&mut session, &mut replay, stop);

        let mut restored = save_and_load(&session);
        assert_eq!(restored.phase(), stop);

        let report = restored.run(&mut replay).unwrap();
        assert_eq!(report, original.report(), "diverged after stop at {:?}", stop);
        assert_eq!(restored.event_log(), original.event_log());
        assert_eq!(restored.ledger(), original.ledger());
        assert_eq!(restored.outcomes(), original.outcomes());
        assert_eq!(restored.skills(), original.skills());
    }
}

#[test]
fn test_snapshot_json_round_trip_is_lossless() {
    let (_, script) = recorded_run(test_config(), 19);
    let mut replay = script.clone();
    let mut session = Session::new(test_config()).unwrap();
    play_until(&mut session, &mut replay, SessionPhase::Results { period: 2 });

    let snapshot = session.snapshot().unwrap();
    let json = snapshot.to_json().unwrap();
    assert_eq!(SessionSnapshot::from_json(&json).unwrap(), snapshot);

    let restored = save_and_load(&session);
    assert_eq!(restored.snapshot().unwrap(), snapshot);
}

#[test]
fn test_partial_barrier_survives_restore() {
    let mut session = Session::new(test_config()).unwrap();
    session.advance().unwrap();
    session
        .submit_offer(
            1,
            EmployerAction::Offer {
                worker: 4,
                wage: 350,
                training: true,
            },
        )
        .unwrap();

    let mut restored = save_and_load(&session);
    assert_eq!(restored.pending(), vec![2, 3]);

    // The restored barrier still remembers employer 1's submission
    let err = restored.submit_offer(1, EmployerAction::Withdraw).unwrap_err();
    assert!(matches!(err, SimulationError::Barrier(_)));

    restored.submit_offer(2, EmployerAction::Withdraw).unwrap();
    restored.submit_offer(3, EmployerAction::Withdraw).unwrap();
    restored.advance().unwrap();

    let offer = restored.ledger().get(OfferId(0)).unwrap();
    assert_eq!(offer.employer(), 1);
    assert_eq!(offer.wage(), 350);
    assert!(offer.training());
    assert_eq!(restored.pending(), vec![4]);
}

// ============================================================================
// Refused restores
// ============================================================================

#[test]
fn test_restore_refuses_different_config() {
    let session = Session::new(test_config()).unwrap();
    let snapshot = session.snapshot().unwrap();

    let other = MarketConfig {
        max_wage: 999,
        ..test_config()
    };
    let err = Session::restore(other.clone(), snapshot).err().unwrap();
    assert_eq!(
        err,
        SimulationError::ConfigMismatch {
            expected: compute_config_hash(&test_config()).unwrap(),
            actual: compute_config_hash(&other).unwrap(),
        }
    );
}

#[test]
fn test_config_hash_stable_and_sensitive() {
    let a = compute_config_hash(&test_config()).unwrap();
    let b = compute_config_hash(&test_config()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);

    let reseeded = MarketConfig {
        rng_seed: 43,
        ..test_config()
    };
    assert_ne!(a, compute_config_hash(&reseeded).unwrap());
}

#[test]
fn test_restore_refuses_tampered_offers() {
    let mut session = Session::new(test_config()).unwrap();
    session.advance().unwrap();
    session
        .submit_offer(
            1,
            EmployerAction::Offer {
                worker: 5,
                wage: 200,
                training: false,
            },
        )
        .unwrap();
    session.expire_pending();
    session.advance().unwrap();

    // Same (period, round, employer, worker) key twice
    let mut duplicated = session.snapshot().unwrap();
    duplicated
        .offers
        .push(Offer::new(OfferId(1), 1, 1, 1, 5, 900, false));
    let err = Session::restore(test_config(), duplicated).err().unwrap();
    assert!(matches!(
        err,
        SimulationError::Ledger(LedgerError::DuplicateOffer { .. })
    ));

    // Offer ids out of sequence
    let mut reordered = session.snapshot().unwrap();
    reordered.offers[0] = Offer::new(OfferId(3), 1, 1, 1, 5, 200, false);
    let err = Session::restore(test_config(), reordered).err().unwrap();
    assert_eq!(
        err,
        SimulationError::Ledger(LedgerError::OutOfSequence {
            position: 0,
            found: OfferId(3)
        })
    );
}

#[test]
fn test_malformed_snapshot_json() {
    let err = SessionSnapshot::from_json("{\"config_hash\": 5}").unwrap_err();
    assert!(matches!(err, SimulationError::SerializationError(_)));
}

// ============================================================================
// Forward carry
// ============================================================================

#[test]
fn test_next_period_refuses_skills_out_of_step_with_outcomes() {
    let mut session = Session::new(test_config()).unwrap();
    play_until(
        &mut session,
        &mut ScriptedActions::new(),
        SessionPhase::Results { period: 1 },
    );

    // Worker 4 never trained, yet the tracker claims a pending increase
    let json = session.snapshot().unwrap().to_json().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["skills"]["records"]["4"]["pending_increase"] = serde_json::Value::Bool(true);
    let snapshot = SessionSnapshot::from_json(&value.to_string()).unwrap();

    let mut restored = Session::restore(test_config(), snapshot).unwrap();
    restored.expire_pending();
    let err = restored.advance().unwrap_err();

    assert_eq!(
        err,
        SimulationError::Skill(SkillError::OutOfStep { worker: 4, period: 1 })
    );
    assert!(err.is_fatal());
}

#[test]
fn test_untampered_restore_carries_skills_forward() {
    let mut session = Session::new(test_config()).unwrap();
    play_until(
        &mut session,
        &mut ScriptedActions::new(),
        SessionPhase::Results { period: 1 },
    );

    let mut restored = save_and_load(&session);
    restored.expire_pending();
    restored.advance().unwrap();

    assert_eq!(restored.phase(), SessionPhase::HiringOffers { period: 2, round: 1 });
    for worker in restored.state().workers() {
        assert_eq!(
            restored.skills().level(worker),
            restored.period_outcome(worker, 1).unwrap().skill
        );
    }
}
