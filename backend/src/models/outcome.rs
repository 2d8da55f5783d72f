//! Period outcomes
//!
//! One [`PeriodOutcome`] per participant per period, stored in an arena
//! indexed by (participant, period). The arena is written only by the
//! payoff step and read by everything that needs history. At period start
//! the scheduler carries skills forward from the previous period's worker
//! outcomes ([`crate::skills::SkillTracker::carry_forward`]); results
//! display and the final payoff report read it as well.

use crate::models::offer::OfferId;
use crate::models::participant::{ParticipantId, Role};
use crate::payoff::RevenueBreakdown;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised when recording outcomes
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OutcomeError {
    #[error("Outcome for participant {participant} in period {period} already recorded")]
    Duplicate {
        participant: ParticipantId,
        period: usize,
    },

    #[error("Outcome for participant {participant} skips to period {got}; expected period {expected}")]
    OutOfOrder {
        participant: ParticipantId,
        expected: usize,
        got: usize,
    },
}

/// What a participant realized in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodOutcome {
    pub period: usize,
    pub participant: ParticipantId,
    pub role: Role,

    /// Realized payoff (i64 points)
    pub payoff: i64,

    /// Contract held this period, if any
    pub contract: Option<OfferId>,
    pub counterpart: Option<ParticipantId>,
    pub wage: Option<i64>,
    pub training: bool,

    /// Skill level used this period: the worker's own, or for a matched
    /// employer the level of the hired worker
    pub skill: Option<u32>,

    /// Effort supplied under the contract
    pub effort: Option<u32>,

    /// Worker's cost of effort
    pub effort_cost: Option<i64>,

    /// Revenue generated (matched employers only)
    pub revenue: Option<RevenueBreakdown>,

    /// Worker earned a skill increase for next period
    pub skill_increase: bool,
}

impl PeriodOutcome {
    /// Outcome of a participant who ended the period without a contract
    pub fn unmatched(
        period: usize,
        participant: ParticipantId,
        role: Role,
        payoff: i64,
        skill: Option<u32>,
    ) -> Self {
        Self {
            period,
            participant,
            role,
            payoff,
            contract: None,
            counterpart: None,
            wage: None,
            training: false,
            skill,
            effort: None,
            effort_cost: None,
            revenue: None,
            skill_increase: false,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.contract.is_some()
    }
}

/// Arena of outcomes indexed by (participant, period)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeArena {
    /// Per participant, outcomes in period order (`index = period - 1`)
    by_participant: BTreeMap<ParticipantId, Vec<PeriodOutcome>>,
}

impl OutcomeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome; periods must be recorded in order without gaps
    pub fn record(&mut self, outcome: PeriodOutcome) -> Result<(), OutcomeError> {
        let history = self.by_participant.entry(outcome.participant).or_default();
        let expected = history.len() + 1;
        if outcome.period < expected {
            return Err(OutcomeError::Duplicate {
                participant: outcome.participant,
                period: outcome.period,
            });
        }
        if outcome.period > expected {
            return Err(OutcomeError::OutOfOrder {
                participant: outcome.participant,
                expected,
                got: outcome.period,
            });
        }
        history.push(outcome);
        Ok(())
    }

    pub fn get(&self, participant: ParticipantId, period: usize) -> Option<&PeriodOutcome> {
        period
            .checked_sub(1)
            .and_then(|index| self.by_participant.get(&participant)?.get(index))
    }

    /// All outcomes of a period, ordered by participant id
    pub fn for_period(&self, period: usize) -> Vec<&PeriodOutcome> {
        self.by_participant
            .keys()
            .filter_map(|&participant| self.get(participant, period))
            .collect()
    }

    /// A participant's outcomes in period order
    pub fn history(&self, participant: ParticipantId) -> &[PeriodOutcome] {
        self.by_participant
            .get(&participant)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A participant's payoffs in period order
    pub fn payoff_history(&self, participant: ParticipantId) -> Vec<i64> {
        self.history(participant).iter().map(|o| o.payoff).collect()
    }

    pub fn total_payoff(&self, participant: ParticipantId) -> i64 {
        self.history(participant).iter().map(|o| o.payoff).sum()
    }

    /// Number of periods with recorded outcomes for every participant
    pub fn completed_periods(&self) -> usize {
        self.by_participant
            .values()
            .map(Vec::len)
            .min()
            .unwrap_or(0)
    }
}
