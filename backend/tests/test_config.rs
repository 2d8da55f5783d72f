//! Configuration Tests
//!
//! Loading, presets and cross-field validation of [`MarketConfig`].

use labor_market_core::orchestrator::RandomActions;
use labor_market_core::{ConfigError, MarketConfig, MarketPreset, Session, SimulationError};

#[test]
fn test_defaults_describe_three_by_three_market() {
    let config = MarketConfig::default();

    assert_eq!(config.num_periods, 5);
    assert_eq!(config.num_employers, 3);
    assert_eq!(config.num_workers, 3);
    assert_eq!(config.hiring_steps, config.num_workers);
    assert_eq!(config.group_size(), 6);
    assert_eq!(config.max_skill_level(), 15);
    assert_eq!(config.max_effort, 10);
    assert_eq!(config.starting_skills, vec![5, 5, 1]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_json_missing_fields_take_defaults() {
    let config = MarketConfig::from_json(r#"{"num_periods": 2, "max_wage": 900}"#).unwrap();

    assert_eq!(config.num_periods, 2);
    assert_eq!(config.max_wage, 900);
    assert_eq!(config.employer_endowment, 800);
    assert_eq!(config.effort_costs, MarketConfig::default().effort_costs);
}

#[test]
fn test_num_rounds_alias() {
    let config = MarketConfig::from_json(r#"{"num_rounds": 7}"#).unwrap();
    assert_eq!(config.num_periods, 7);
}

#[test]
fn test_json_round_trip_preserves_config() {
    let config = MarketConfig {
        num_periods: 3,
        employer_labels: vec!["Acme".into(), "Globex".into(), "Initech".into()],
        randomize_roles: true,
        rng_seed: 99,
        ..MarketConfig::default()
    };

    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(MarketConfig::from_json(&json).unwrap(), config);
}

#[test]
fn test_malformed_json_is_an_error() {
    assert!(MarketConfig::from_json(r#"{"num_periods": "three"}"#).is_err());
}

#[test]
fn test_presets() {
    let base = MarketConfig {
        num_workers: 4,
        hiring_steps: 4,
        ..MarketConfig::default()
    };

    assert_eq!(
        base.clone().with_preset(MarketPreset::HomogeneousLow).starting_skills,
        vec![1, 1, 1, 1]
    );
    assert_eq!(
        base.clone().with_preset(MarketPreset::HomogeneousHigh).starting_skills,
        vec![5, 5, 5, 5]
    );
    assert_eq!(
        base.with_preset(MarketPreset::Heterogeneous).starting_skills,
        vec![5, 5, 1, 1]
    );
}

#[test]
fn test_zero_counts_rejected() {
    for field in ["num_periods", "hiring_steps", "num_employers", "num_workers"] {
        let mut config = MarketConfig::default();
        match field {
            "num_periods" => config.num_periods = 0,
            "hiring_steps" => config.hiring_steps = 0,
            "num_employers" => config.num_employers = 0,
            _ => config.num_workers = 0,
        }
        assert_eq!(config.validate(), Err(ConfigError::NonPositive { field }));
    }
}

#[test]
fn test_effort_table_must_cover_max_effort() {
    let config = MarketConfig {
        max_effort: 12,
        ..MarketConfig::default()
    };
    assert_eq!(
        config.validate(),
        Err(ConfigError::EffortTableTooShort {
            len: 10,
            max_effort: 12
        })
    );
}

#[test]
fn test_starting_skills_checked_against_table() {
    let short = MarketConfig {
        starting_skills: vec![1, 1],
        ..MarketConfig::default()
    };
    assert_eq!(
        short.validate(),
        Err(ConfigError::StartingSkillsTooShort {
            len: 2,
            num_workers: 3
        })
    );

    let out_of_range = MarketConfig {
        starting_skills: vec![1, 16, 1],
        ..MarketConfig::default()
    };
    assert_eq!(
        out_of_range.validate(),
        Err(ConfigError::StartingSkillOutOfRange {
            slot: 1,
            level: 16,
            max_level: 15
        })
    );
}

#[test]
fn test_non_finite_coefficients_rejected() {
    let config = MarketConfig {
        training_productivity_multiplier: f64::NAN,
        ..MarketConfig::default()
    };
    assert_eq!(
        config.validate(),
        Err(ConfigError::NotFinite {
            field: "training_productivity_multiplier"
        })
    );

    let config = MarketConfig {
        skill_multipliers: vec![100.0, -1.0],
        ..MarketConfig::default()
    };
    assert_eq!(
        config.validate(),
        Err(ConfigError::NotFinite {
            field: "skill_multipliers"
        })
    );
}

#[test]
fn test_label_pool_must_be_empty_or_large_enough() {
    let config = MarketConfig {
        worker_labels: vec!["Ada".into(), "Bo".into()],
        ..MarketConfig::default()
    };
    assert_eq!(
        config.validate(),
        Err(ConfigError::LabelPoolTooSmall {
            pool: "worker_labels",
            len: 2,
            needed: 3
        })
    );
}

#[test]
fn test_session_refuses_invalid_config() {
    let config = MarketConfig {
        training_cost: -5,
        ..MarketConfig::default()
    };

    let err = Session::new(config).err().unwrap();
    assert_eq!(err, SimulationError::Config(ConfigError::NegativeTrainingCost(-5)));
    assert!(err.is_fatal());
}

#[test]
fn test_money_fields_bounded() {
    let limit = MarketConfig::MAX_AMOUNT;

    let rich_worker = MarketConfig {
        worker_endowment: i64::MAX - 10,
        ..MarketConfig::default()
    };
    assert_eq!(
        rich_worker.validate(),
        Err(ConfigError::AmountTooLarge {
            field: "worker_endowment",
            value: i64::MAX - 10,
            limit,
        })
    );

    let wide_wages = MarketConfig {
        max_wage: i64::MAX,
        ..MarketConfig::default()
    };
    assert!(matches!(
        wide_wages.validate(),
        Err(ConfigError::AmountTooLarge { field: "max_wage", .. })
    ));

    let indebted_employer = MarketConfig {
        employer_endowment: i64::MIN,
        ..MarketConfig::default()
    };
    assert!(matches!(
        indebted_employer.validate(),
        Err(ConfigError::AmountTooLarge { field: "employer_endowment", .. })
    ));

    let huge_revenue = MarketConfig {
        base_revenue: 1e300,
        ..MarketConfig::default()
    };
    assert!(matches!(
        huge_revenue.validate(),
        Err(ConfigError::AmountTooLarge { field: "base_revenue", .. })
    ));

    let at_limit = MarketConfig {
        worker_endowment: limit,
        max_wage: limit,
        ..MarketConfig::default()
    };
    assert!(at_limit.validate().is_ok());
}

#[test]
fn test_session_at_money_limit_pays_without_overflow() {
    let limit = MarketConfig::MAX_AMOUNT;
    let config = MarketConfig {
        num_periods: 1,
        num_employers: 1,
        num_workers: 1,
        starting_skills: vec![1],
        worker_endowment: limit,
        employer_endowment: -limit,
        max_wage: limit,
        ..MarketConfig::default()
    };
    let mut session = Session::new(config).unwrap();
    let report = session
        .run(&mut RandomActions::new(4, 0.0))
        .unwrap();

    assert!(report.finished);
    assert_eq!(report.participants.len(), 2);
}
