//! Protocol property tests
//!
//! Random markets played by seeded random agents. Every run must keep the
//! matching, exclusion, payoff and skill invariants, and replaying the
//! recorded actions must reproduce the run exactly.

use labor_market_core::orchestrator::{RandomActions, Recorder};
use labor_market_core::{MarketConfig, PayoffEngine, Role, Session};
use proptest::prelude::*;
use std::collections::BTreeSet;

// ============================================================================
// Strategies
// ============================================================================

const TABLE: [f64; 4] = [100.0, 140.0, 177.0, 211.0];

fn market_config() -> impl Strategy<Value = MarketConfig> {
    (
        1usize..=3,
        1usize..=4,
        1usize..=4,
        1usize..=4,
        1usize..=4,
        1u32..=4,
        any::<bool>(),
        any::<u64>(),
    )
        .prop_map(
            |(periods, employers, workers, hiring_steps, table_len, skill, randomize, seed)| {
                MarketConfig {
                    num_periods: periods,
                    hiring_steps,
                    num_employers: employers,
                    num_workers: workers,
                    max_wage: 600,
                    skill_multipliers: TABLE[..table_len].to_vec(),
                    starting_skills: vec![skill.min(table_len as u32); workers],
                    randomize_roles: randomize,
                    rng_seed: seed,
                    ..MarketConfig::default()
                }
            },
        )
}

fn play(config: &MarketConfig, seed: u64, timeout_rate: f64) -> (Session, Recorder<RandomActions>) {
    let mut session = Session::new(config.clone()).unwrap();
    let mut recorder = Recorder::new(RandomActions::new(seed, timeout_rate));
    session.run(&mut recorder).unwrap();
    (session, recorder)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn single_contract_per_participant(
        config in market_config(),
        seed in any::<u64>(),
        timeout_rate in 0.0f64..0.5,
    ) {
        let (session, _) = play(&config, seed, timeout_rate);

        for period in 1..=config.num_periods {
            prop_assert!(session.ledger().verify_period(period).is_ok());

            let matched_employers = session
                .period_results(period)
                .iter()
                .filter(|o| o.role == Role::Employer && o.is_matched())
                .count();
            let matched_workers = session
                .period_results(period)
                .iter()
                .filter(|o| o.role == Role::Worker && o.is_matched())
                .count();
            prop_assert_eq!(matched_employers, session.ledger().accepted_count(period));
            prop_assert_eq!(matched_workers, matched_employers);
        }
    }

    #[test]
    fn rejected_pairs_never_trade_again_in_period(
        config in market_config(),
        seed in any::<u64>(),
        timeout_rate in 0.0f64..0.5,
    ) {
        let (session, _) = play(&config, seed, timeout_rate);
        let offers = session.ledger().offers();

        let mut excluded = BTreeSet::new();
        for offer in offers {
            let pair = (offer.period(), offer.employer(), offer.worker());
            prop_assert!(!excluded.contains(&pair), "offer {:?} to an excluded pair", offer.id());
            if offer.is_rejected() {
                excluded.insert(pair);
            }
            prop_assert!(offer.round() <= config.hiring_steps);
            prop_assert!(config.wage_in_bounds(offer.wage()));
        }
        prop_assert!(offers.iter().all(|o| !o.is_open()));
    }

    #[test]
    fn payoffs_follow_contracts(
        config in market_config(),
        seed in any::<u64>(),
        timeout_rate in 0.0f64..0.5,
    ) {
        let (session, _) = play(&config, seed, timeout_rate);
        let engine = PayoffEngine::new(&config);

        for period in 1..=config.num_periods {
            for outcome in session.period_results(period) {
                let expected = match (outcome.role, outcome.contract) {
                    (Role::Employer, None) => config.employer_endowment,
                    (Role::Worker, None) => config.worker_endowment,
                    (Role::Worker, Some(_)) => engine
                        .worker_payoff(outcome.wage.unwrap(), outcome.effort.unwrap())
                        .unwrap(),
                    (Role::Employer, Some(_)) => engine
                        .employer_payoff(
                            outcome.wage.unwrap(),
                            outcome.skill.unwrap(),
                            outcome.effort.unwrap(),
                            outcome.training,
                        )
                        .unwrap(),
                };
                prop_assert_eq!(outcome.payoff, expected);
            }
        }
    }

    #[test]
    fn skills_rise_only_after_training(
        config in market_config(),
        seed in any::<u64>(),
        timeout_rate in 0.0f64..0.5,
    ) {
        let (session, _) = play(&config, seed, timeout_rate);
        let max_level = config.max_skill_level();

        for worker in session.state().workers() {
            let history = session.outcomes().history(worker);
            prop_assert_eq!(history.len(), config.num_periods);

            for pair in history.windows(2) {
                let (before, after) = (&pair[0], &pair[1]);
                let level = before.skill.unwrap();
                let expected = if before.training && before.is_matched() {
                    (level + 1).min(max_level)
                } else {
                    level
                };
                prop_assert_eq!(after.skill.unwrap(), expected);
            }
            prop_assert!(session.skills().level(worker).unwrap() <= max_level);
        }
    }

    #[test]
    fn recorded_actions_replay_identically(
        config in market_config(),
        seed in any::<u64>(),
        timeout_rate in 0.0f64..0.5,
    ) {
        let (original, recorder) = play(&config, seed, timeout_rate);
        let mut script = recorder.into_script();

        let mut replay = Session::new(config.clone()).unwrap();
        let report = replay.run(&mut script).unwrap();

        prop_assert_eq!(report, original.report());
        prop_assert_eq!(replay.event_log(), original.event_log());
        prop_assert_eq!(replay.ledger(), original.ledger());
    }
}
