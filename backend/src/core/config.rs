//! Session configuration
//!
//! A single immutable [`MarketConfig`] is built (or deserialized) once per
//! session, validated, and then passed by reference into every component.
//!
//! CRITICAL: All money values are i64 (points)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration inconsistencies detected before any period runs
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be > 0")]
    NonPositive { field: &'static str },

    #[error("{field} must be a finite, non-negative number")]
    NotFinite { field: &'static str },

    #[error("skill_multipliers must not be empty")]
    EmptySkillTable,

    #[error("effort_costs has {len} entries but max_effort is {max_effort}")]
    EffortTableTooShort { len: usize, max_effort: u32 },

    #[error("starting_skills has {len} entries but there are {num_workers} workers")]
    StartingSkillsTooShort { len: usize, num_workers: usize },

    #[error("starting skill {level} for worker slot {slot} is outside 1..={max_level}")]
    StartingSkillOutOfRange {
        slot: usize,
        level: u32,
        max_level: u32,
    },

    #[error("{pool} has {len} labels but {needed} are needed")]
    LabelPoolTooSmall {
        pool: &'static str,
        len: usize,
        needed: usize,
    },

    #[error("training_cost must not be negative, got {0}")]
    NegativeTrainingCost(i64),

    #[error("{field} = {value} exceeds the money limit of {limit} points")]
    AmountTooLarge {
        field: &'static str,
        value: i64,
        limit: i64,
    },
}

/// Starting-skill distributions used by the experiment's market treatments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPreset {
    /// Every worker starts at level 1
    HomogeneousLow,
    /// Every worker starts at level 5
    HomogeneousHigh,
    /// First half of the worker slots at level 5, the rest at level 1
    Heterogeneous,
}

impl MarketPreset {
    pub const LOW_SKILL: u32 = 1;
    pub const HIGH_SKILL: u32 = 5;

    /// Starting skills for `num_workers` worker slots
    ///
    /// # Example
    /// ```
    /// use labor_market_core::MarketPreset;
    ///
    /// assert_eq!(MarketPreset::Heterogeneous.starting_skills(4), vec![5, 5, 1, 1]);
    /// assert_eq!(MarketPreset::HomogeneousLow.starting_skills(2), vec![1, 1]);
    /// ```
    pub fn starting_skills(self, num_workers: usize) -> Vec<u32> {
        match self {
            MarketPreset::HomogeneousLow => vec![Self::LOW_SKILL; num_workers],
            MarketPreset::HomogeneousHigh => vec![Self::HIGH_SKILL; num_workers],
            MarketPreset::Heterogeneous => {
                let high = num_workers.div_ceil(2);
                (0..num_workers)
                    .map(|slot| {
                        if slot < high {
                            Self::HIGH_SKILL
                        } else {
                            Self::LOW_SKILL
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Complete per-session configuration
///
/// # Example
/// ```
/// use labor_market_core::MarketConfig;
///
/// let config = MarketConfig {
///     num_periods: 2,
///     hiring_steps: 1,
///     num_employers: 1,
///     num_workers: 1,
///     starting_skills: vec![1],
///     ..MarketConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_skill_level(), 15);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Number of periods in the session
    #[serde(alias = "num_rounds")]
    pub num_periods: usize,

    /// Maximum hiring rounds per period
    pub hiring_steps: usize,

    pub num_employers: usize,
    pub num_workers: usize,

    /// Payoff of an unmatched employer, and the base of a matched one
    pub employer_endowment: i64,

    /// Payoff of an unmatched worker, and the base of a matched one
    pub worker_endowment: i64,

    /// Upper wage bound (inclusive); the lower bound is always 1
    pub max_wage: i64,

    /// Productivity coefficient per skill level, indexed by `level - 1`
    pub skill_multipliers: Vec<f64>,

    /// Effort cost per effort level, indexed by `effort - 1`
    pub effort_costs: Vec<i64>,

    /// Highest selectable effort level
    pub max_effort: u32,

    /// Direct cost to the employer when a contract includes training
    pub training_cost: i64,

    /// Share of revenue kept by the employer when a contract includes training
    pub training_productivity_multiplier: f64,

    pub base_revenue: f64,

    /// Starting skill per worker slot (in slot order)
    pub starting_skills: Vec<u32>,

    /// Label pool for employers; numbered fallbacks when empty
    pub employer_labels: Vec<String>,

    /// Label pool for workers; numbered fallbacks when empty
    pub worker_labels: Vec<String>,

    /// Shuffle which participant slots are employers
    pub randomize_roles: bool,

    /// Seed for label sampling and role shuffling
    pub rng_seed: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let num_workers = 3;
        Self {
            num_periods: 5,
            hiring_steps: num_workers,
            num_employers: 3,
            num_workers,
            employer_endowment: 800,
            worker_endowment: 400,
            max_wage: 1500,
            skill_multipliers: vec![
                100.0, 140.0, 177.0, 211.0, 242.0, 270.0, 295.0, 317.0, 336.0, 352.0, 365.0,
                375.0, 382.0, 386.0, 387.0,
            ],
            effort_costs: vec![0, 20, 40, 60, 100, 140, 180, 240, 300, 360],
            max_effort: 10,
            training_cost: 50,
            training_productivity_multiplier: 0.5,
            base_revenue: 1.0,
            starting_skills: MarketPreset::Heterogeneous.starting_skills(num_workers),
            employer_labels: Vec::new(),
            worker_labels: Vec::new(),
            randomize_roles: false,
            rng_seed: 1,
        }
    }
}

impl MarketConfig {
    /// Parse a configuration from JSON (missing fields take their defaults)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Replace the starting skills with a preset distribution
    pub fn with_preset(mut self, preset: MarketPreset) -> Self {
        self.starting_skills = preset.starting_skills(self.num_workers);
        self
    }

    /// Largest magnitude any single money field may take (points)
    pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

    /// Highest defined skill level (size of the multiplier table)
    pub fn max_skill_level(&self) -> u32 {
        self.skill_multipliers.len() as u32
    }

    /// Total participants in the group
    pub fn group_size(&self) -> usize {
        self.num_employers + self.num_workers
    }

    /// Multiplier for a skill level, if the level is defined
    pub fn skill_multiplier(&self, level: u32) -> Option<f64> {
        level
            .checked_sub(1)
            .and_then(|index| self.skill_multipliers.get(index as usize))
            .copied()
    }

    /// Cost of an effort level, if the level is selectable
    pub fn effort_cost(&self, effort: u32) -> Option<i64> {
        if effort == 0 || effort > self.max_effort {
            return None;
        }
        self.effort_costs.get(effort as usize - 1).copied()
    }

    /// Whether a wage lies in `[1, max_wage]`
    pub fn wage_in_bounds(&self, wage: i64) -> bool {
        (1..=self.max_wage).contains(&wage)
    }

    /// Check every cross-field constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("num_periods", self.num_periods),
            ("hiring_steps", self.hiring_steps),
            ("num_employers", self.num_employers),
            ("num_workers", self.num_workers),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        if self.max_wage < 1 {
            return Err(ConfigError::NonPositive { field: "max_wage" });
        }
        if self.max_effort == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_effort",
            });
        }

        if self.skill_multipliers.is_empty() {
            return Err(ConfigError::EmptySkillTable);
        }
        if self
            .skill_multipliers
            .iter()
            .any(|m| !m.is_finite() || *m < 0.0)
        {
            return Err(ConfigError::NotFinite {
                field: "skill_multipliers",
            });
        }
        for (field, value) in [
            (
                "training_productivity_multiplier",
                self.training_productivity_multiplier,
            ),
            ("base_revenue", self.base_revenue),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NotFinite { field });
            }
        }

        if self.effort_costs.len() < self.max_effort as usize {
            return Err(ConfigError::EffortTableTooShort {
                len: self.effort_costs.len(),
                max_effort: self.max_effort,
            });
        }

        if self.starting_skills.len() < self.num_workers {
            return Err(ConfigError::StartingSkillsTooShort {
                len: self.starting_skills.len(),
                num_workers: self.num_workers,
            });
        }
        let max_level = self.max_skill_level();
        for (slot, &level) in self.starting_skills.iter().take(self.num_workers).enumerate() {
            if level == 0 || level > max_level {
                return Err(ConfigError::StartingSkillOutOfRange {
                    slot,
                    level,
                    max_level,
                });
            }
        }

        if self.training_cost < 0 {
            return Err(ConfigError::NegativeTrainingCost(self.training_cost));
        }

        // Keeps every payoff sum far from i64 overflow
        let limit = Self::MAX_AMOUNT;
        let max_effort_cost = self
            .effort_costs
            .iter()
            .take(self.max_effort as usize)
            .map(|c| c.saturating_abs())
            .max()
            .unwrap_or(0);
        let max_multiplier = self.skill_multipliers.iter().copied().fold(0.0, f64::max);
        let peak_revenue = self.base_revenue
            * max_multiplier
            * self.max_effort as f64
            * self.training_productivity_multiplier.max(1.0);
        for (field, value) in [
            ("employer_endowment", self.employer_endowment.saturating_abs()),
            ("worker_endowment", self.worker_endowment.saturating_abs()),
            ("max_wage", self.max_wage),
            ("training_cost", self.training_cost),
            ("effort_costs", max_effort_cost),
        ] {
            if value > limit {
                return Err(ConfigError::AmountTooLarge { field, value, limit });
            }
        }
        if peak_revenue > limit as f64 {
            return Err(ConfigError::AmountTooLarge {
                field: "base_revenue",
                value: peak_revenue.min(i64::MAX as f64) as i64,
                limit,
            });
        }

        for (pool, labels, needed) in [
            ("employer_labels", &self.employer_labels, self.num_employers),
            ("worker_labels", &self.worker_labels, self.num_workers),
        ] {
            if !labels.is_empty() && labels.len() < needed {
                return Err(ConfigError::LabelPoolTooSmall {
                    pool,
                    len: labels.len(),
                    needed,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(MarketConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_effort_cost_lookup_bounds() {
        let config = MarketConfig::default();
        assert_eq!(config.effort_cost(1), Some(0));
        assert_eq!(config.effort_cost(10), Some(360));
        assert_eq!(config.effort_cost(0), None);
        assert_eq!(config.effort_cost(11), None);
    }

    #[test]
    fn test_skill_multiplier_is_one_based() {
        let config = MarketConfig::default();
        assert_eq!(config.skill_multiplier(1), Some(100.0));
        assert_eq!(config.skill_multiplier(2), Some(140.0));
        assert_eq!(config.skill_multiplier(0), None);
        assert_eq!(config.skill_multiplier(16), None);
    }

    #[test]
    fn test_heterogeneous_preset_rounds_high_half_up() {
        assert_eq!(
            MarketPreset::Heterogeneous.starting_skills(3),
            vec![5, 5, 1]
        );
        assert_eq!(
            MarketPreset::Heterogeneous.starting_skills(6),
            vec![5, 5, 5, 1, 1, 1]
        );
    }

    #[test]
    fn test_wage_bounds() {
        let config = MarketConfig::default();
        assert!(!config.wage_in_bounds(0));
        assert!(config.wage_in_bounds(1));
        assert!(config.wage_in_bounds(1500));
        assert!(!config.wage_in_bounds(1501));
    }
}
