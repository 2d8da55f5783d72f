//! Payoff Engine
//!
//! Computes every participant's payoff at the end of a period's work phase
//! and decides which workers earn a skill increase.
//!
//! # Payoff Rules
//!
//! ```text
//! unmatched employer = employer_endowment
//! unmatched worker   = worker_endowment
//! matched worker     = worker_endowment + wage - effort_cost(effort)
//!
//! gross revenue      = round(base_revenue × multiplier(skill) × effort)
//! with training      = round(base_revenue × multiplier(skill) × effort × training_multiplier)
//! matched employer   = employer_endowment + revenue - wage            (no training)
//!                    = employer_endowment + revenue - training_cost - wage   (training)
//! ```
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 points
//! 2. Every multiplied quantity is rounded exactly once, half away from zero
//!    ([`round_currency`]); a rounded value is never multiplied again
//! 3. Training flags the worker for a one-level increase that takes effect
//!    at the next period start

use crate::core::config::MarketConfig;
use crate::models::event::{Event, EventLog};
use crate::models::ledger::{LedgerError, OfferLedger};
use crate::models::outcome::{OutcomeArena, OutcomeError, PeriodOutcome};
use crate::models::participant::{ParticipantId, Role};
use crate::models::state::MarketState;
use crate::skills::{SkillError, SkillTracker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while computing payoffs
#[derive(Debug, Error, PartialEq)]
pub enum PayoffError {
    #[error("Effort {effort} is outside 1..={max_effort}")]
    EffortOutOfRange { effort: u32, max_effort: u32 },

    #[error("Skill level {level} is outside 1..={max_level}")]
    SkillOutOfRange { level: u32, max_level: u32 },

    #[error("Matched worker {0} has no effort choice")]
    MissingEffort(ParticipantId),

    #[error("Worker {0} has no skill level")]
    MissingSkill(ParticipantId),

    #[error("Participant {participant} points at {pointer:?} but holds contract with {contract:?} in period {period}")]
    ContractMismatch {
        participant: ParticipantId,
        period: usize,
        pointer: Option<ParticipantId>,
        contract: Option<ParticipantId>,
    },

    #[error("Payoff arithmetic overflowed")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Outcome(#[from] OutcomeError),

    #[error(transparent)]
    Skill(#[from] SkillError),
}

/// Round a currency amount to whole points, half away from zero
///
/// # Example
/// ```
/// use labor_market_core::payoff::round_currency;
///
/// assert_eq!(round_currency(3.5), 4);
/// assert_eq!(round_currency(3.49), 3);
/// assert_eq!(round_currency(-2.5), -3);
/// ```
pub fn round_currency(amount: f64) -> i64 {
    amount.round() as i64
}

/// How a matched employer's revenue was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueBreakdown {
    pub skill: u32,
    pub multiplier: f64,
    pub effort: u32,

    /// Revenue before any training reduction
    pub gross_revenue: i64,

    /// Revenue lost to training this period (0 without training)
    pub productivity_reduction: i64,

    /// Revenue actually credited to the employer
    pub revenue: i64,

    /// Training cost charged (0 without training)
    pub training_cost: i64,
}

impl RevenueBreakdown {
    /// Employer payoff given the endowment and the wage paid
    pub fn employer_payoff(&self, endowment: i64, wage: i64) -> Result<i64, PayoffError> {
        endowment
            .checked_add(self.revenue)
            .and_then(|v| v.checked_sub(self.training_cost))
            .and_then(|v| v.checked_sub(wage))
            .ok_or(PayoffError::Overflow)
    }
}

/// Projected payoffs of one effort level under a given contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortProjection {
    pub effort: u32,
    pub effort_cost: i64,
    pub worker_payoff: i64,
    pub employer_payoff: i64,
}

/// One row of the skill table: multiplier and gross revenue per effort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTableRow {
    pub level: u32,
    pub multiplier: f64,
    /// `revenue_by_effort[e - 1]` is the gross revenue at effort `e`
    pub revenue_by_effort: Vec<i64>,
}

/// Stateless payoff calculator over a session configuration
///
/// # Example
///
/// ```rust
/// use labor_market_core::payoff::PayoffEngine;
/// use labor_market_core::MarketConfig;
///
/// let config = MarketConfig::default();
/// let engine = PayoffEngine::new(&config);
///
/// // skill 1 (multiplier 100), effort 2, wage 150, no training
/// assert_eq!(engine.employer_payoff(150, 1, 2, false).unwrap(), 800 + 200 - 150);
/// assert_eq!(engine.worker_payoff(150, 2).unwrap(), 400 + 150 - 20);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PayoffEngine<'a> {
    config: &'a MarketConfig,
}

impl<'a> PayoffEngine<'a> {
    pub fn new(config: &'a MarketConfig) -> Self {
        Self { config }
    }

    pub fn effort_cost(&self, effort: u32) -> Result<i64, PayoffError> {
        self.config
            .effort_cost(effort)
            .ok_or(PayoffError::EffortOutOfRange {
                effort,
                max_effort: self.config.max_effort,
            })
    }

    fn multiplier(&self, skill: u32) -> Result<f64, PayoffError> {
        self.config
            .skill_multiplier(skill)
            .ok_or(PayoffError::SkillOutOfRange {
                level: skill,
                max_level: self.config.max_skill_level(),
            })
    }

    /// Revenue produced by a worker of `skill` supplying `effort`
    pub fn revenue(&self, skill: u32, effort: u32, training: bool) -> Result<RevenueBreakdown, PayoffError> {
        let multiplier = self.multiplier(skill)?;
        self.effort_cost(effort)?;

        let raw = self.config.base_revenue * multiplier * effort as f64;
        let gross_revenue = round_currency(raw);
        let (revenue, training_cost) = if training {
            (
                round_currency(raw * self.config.training_productivity_multiplier),
                self.config.training_cost,
            )
        } else {
            (gross_revenue, 0)
        };

        Ok(RevenueBreakdown {
            skill,
            multiplier,
            effort,
            gross_revenue,
            productivity_reduction: gross_revenue
                .checked_sub(revenue)
                .ok_or(PayoffError::Overflow)?,
            revenue,
            training_cost,
        })
    }

    pub fn worker_payoff(&self, wage: i64, effort: u32) -> Result<i64, PayoffError> {
        let effort_cost = self.effort_cost(effort)?;
        self.config
            .worker_endowment
            .checked_add(wage)
            .and_then(|v| v.checked_sub(effort_cost))
            .ok_or(PayoffError::Overflow)
    }

    pub fn employer_payoff(
        &self,
        wage: i64,
        skill: u32,
        effort: u32,
        training: bool,
    ) -> Result<i64, PayoffError> {
        self.revenue(skill, effort, training)?
            .employer_payoff(self.config.employer_endowment, wage)
    }

    /// Both sides' payoffs at every selectable effort level
    pub fn effort_schedule(
        &self,
        wage: i64,
        skill: u32,
        training: bool,
    ) -> Result<Vec<EffortProjection>, PayoffError> {
        (1..=self.config.max_effort)
            .map(|effort| {
                Ok(EffortProjection {
                    effort,
                    effort_cost: self.effort_cost(effort)?,
                    worker_payoff: self.worker_payoff(wage, effort)?,
                    employer_payoff: self.employer_payoff(wage, skill, effort, training)?,
                })
            })
            .collect()
    }

    /// Gross revenue for every skill level and effort level
    pub fn skill_table(&self) -> Vec<SkillTableRow> {
        self.config
            .skill_multipliers
            .iter()
            .enumerate()
            .map(|(index, &multiplier)| SkillTableRow {
                level: index as u32 + 1,
                multiplier,
                revenue_by_effort: (1..=self.config.max_effort)
                    .map(|effort| round_currency(self.config.base_revenue * multiplier * effort as f64))
                    .collect(),
            })
            .collect()
    }

    /// Compute and record every participant's outcome for a period
    ///
    /// Contracts are read from the ledger and cross-checked against the
    /// participants' match pointers. Every outcome is computed before the
    /// first one is recorded, so a failure leaves the arena and the skill
    /// flags untouched. Training contracts flag the worker's increase.
    pub fn settle_period(
        &self,
        period: usize,
        state: &MarketState,
        ledger: &OfferLedger,
        efforts: &BTreeMap<ParticipantId, u32>,
        skills: &mut SkillTracker,
        outcomes: &mut OutcomeArena,
        events: &mut EventLog,
    ) -> Result<Vec<PeriodOutcome>, PayoffError> {
        ledger.verify_period(period)?;

        let mut settled = Vec::with_capacity(state.len());
        let mut trained = Vec::new();

        for participant in state.participants() {
            let id = participant.id();
            let contract = ledger.contract_for(period, id)?;
            let counterpart = contract.and_then(|c| c.counterpart_of(id));
            if participant.matched_with() != counterpart {
                return Err(PayoffError::ContractMismatch {
                    participant: id,
                    period,
                    pointer: participant.matched_with(),
                    contract: counterpart,
                });
            }

            let outcome = match (participant.role(), contract) {
                (Role::Employer, None) => PeriodOutcome::unmatched(
                    period,
                    id,
                    Role::Employer,
                    self.config.employer_endowment,
                    None,
                ),
                (Role::Worker, None) => PeriodOutcome::unmatched(
                    period,
                    id,
                    Role::Worker,
                    self.config.worker_endowment,
                    Some(skills.level(id).ok_or(PayoffError::MissingSkill(id))?),
                ),
                (role, Some(offer)) => {
                    let worker = offer.worker();
                    let skill = skills.level(worker).ok_or(PayoffError::MissingSkill(worker))?;
                    let effort = *efforts.get(&worker).ok_or(PayoffError::MissingEffort(worker))?;
                    let effort_cost = self.effort_cost(effort)?;

                    let (payoff, revenue) = match role {
                        Role::Worker => (self.worker_payoff(offer.wage(), effort)?, None),
                        Role::Employer => {
                            let breakdown = self.revenue(skill, effort, offer.training())?;
                            (
                                breakdown.employer_payoff(self.config.employer_endowment, offer.wage())?,
                                Some(breakdown),
                            )
                        }
                    };

                    if role.is_worker() && offer.training() {
                        trained.push(worker);
                    }

                    PeriodOutcome {
                        period,
                        participant: id,
                        role,
                        payoff,
                        contract: Some(offer.id()),
                        counterpart,
                        wage: Some(offer.wage()),
                        training: offer.training(),
                        skill: Some(skill),
                        effort: Some(effort),
                        effort_cost: Some(effort_cost),
                        revenue,
                        skill_increase: role.is_worker() && offer.training(),
                    }
                }
            };
            settled.push(outcome);
        }

        for worker in trained {
            skills.flag_increase(worker)?;
        }
        for outcome in &settled {
            outcomes.record(outcome.clone())?;
            events.log(Event::PayoffComputed {
                period,
                participant: outcome.participant,
                payoff: outcome.payoff,
            });
        }

        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_config() -> MarketConfig {
        MarketConfig {
            skill_multipliers: vec![1.0, 1.4, 1.8],
            effort_costs: vec![0, 5, 10, 15, 20],
            max_effort: 5,
            base_revenue: 1.0,
            training_productivity_multiplier: 0.5,
            training_cost: 50,
            employer_endowment: 100,
            worker_endowment: 40,
            ..MarketConfig::default()
        }
    }

    #[test]
    fn test_training_revenue_rounded_once() {
        let config = scenario_config();
        let engine = PayoffEngine::new(&config);

        // 1 × 1.4 × 5 = 7, × 0.5 = 3.5 → 4
        let breakdown = engine.revenue(2, 5, true).unwrap();
        assert_eq!(breakdown.gross_revenue, 7);
        assert_eq!(breakdown.revenue, 4);
        assert_eq!(breakdown.productivity_reduction, 3);
        assert_eq!(breakdown.training_cost, 50);

        assert_eq!(engine.employer_payoff(50, 2, 5, true).unwrap(), 100 + 4 - 50 - 50);
    }

    #[test]
    fn test_no_training_uses_gross_revenue() {
        let config = scenario_config();
        let engine = PayoffEngine::new(&config);
        let breakdown = engine.revenue(3, 3, false).unwrap();
        // 1.8 × 3 = 5.4 → 5
        assert_eq!(breakdown.revenue, 5);
        assert_eq!(breakdown.productivity_reduction, 0);
        assert_eq!(breakdown.training_cost, 0);
    }

    #[test]
    fn test_worker_payoff_subtracts_effort_cost() {
        let config = scenario_config();
        let engine = PayoffEngine::new(&config);
        assert_eq!(engine.worker_payoff(50, 5).unwrap(), 40 + 50 - 20);
        assert_eq!(engine.worker_payoff(50, 1).unwrap(), 90);
    }

    #[test]
    fn test_out_of_range_inputs() {
        let config = scenario_config();
        let engine = PayoffEngine::new(&config);
        assert_eq!(
            engine.worker_payoff(50, 6),
            Err(PayoffError::EffortOutOfRange {
                effort: 6,
                max_effort: 5
            })
        );
        assert_eq!(
            engine.revenue(4, 1, false),
            Err(PayoffError::SkillOutOfRange {
                level: 4,
                max_level: 3
            })
        );
        assert!(engine.revenue(1, 0, false).is_err());
    }

    #[test]
    fn test_payoff_overflow_is_an_error() {
        let config = MarketConfig {
            worker_endowment: i64::MAX - 10,
            employer_endowment: i64::MIN + 10,
            ..scenario_config()
        };
        let engine = PayoffEngine::new(&config);

        assert_eq!(engine.worker_payoff(100, 1), Err(PayoffError::Overflow));
        assert_eq!(engine.employer_payoff(100, 1, 1, false), Err(PayoffError::Overflow));
        assert!(engine.effort_schedule(100, 1, false).is_err());
    }

    #[test]
    fn test_effort_schedule_covers_every_level() {
        let config = scenario_config();
        let engine = PayoffEngine::new(&config);
        let schedule = engine.effort_schedule(30, 1, false).unwrap();

        assert_eq!(schedule.len(), 5);
        assert_eq!(schedule[0].worker_payoff, 70);
        assert_eq!(schedule[0].employer_payoff, 100 + 1 - 30);
        assert_eq!(schedule[4].effort_cost, 20);
        assert_eq!(schedule[4].employer_payoff, 100 + 5 - 30);
    }

    #[test]
    fn test_skill_table_default_config() {
        let config = MarketConfig::default();
        let table = PayoffEngine::new(&config).skill_table();

        assert_eq!(table.len(), 15);
        assert_eq!(table[0].level, 1);
        assert_eq!(&table[0].revenue_by_effort[..3], &[100, 200, 300]);
        assert_eq!(table[14].revenue_by_effort[9], 3870);
    }
}
