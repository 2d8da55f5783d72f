//! Skill Tracker
//!
//! Holds each worker's current skill level and the pending-increase flag
//! set by training. Levels only move at period boundaries, when
//! [`SkillTracker::carry_forward`] checks the previous period's outcomes
//! and applies pending increases.
//!
//! # Critical Invariants
//!
//! 1. Every level lies in `1..=max_level`
//! 2. Levels never decrease
//! 3. An increase is applied at most once per flag and is capped at
//!    `max_level`

use crate::models::outcome::PeriodOutcome;
use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by skill operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SkillError {
    #[error("Worker {0} has no skill record")]
    UnknownWorker(ParticipantId),

    #[error("Skill level {level} for worker {worker} is outside 1..={max_level}")]
    LevelOutOfRange {
        worker: ParticipantId,
        level: u32,
        max_level: u32,
    },

    #[error("Skill table has no levels")]
    NoLevels,

    #[error("Worker {worker}'s period {period} outcome disagrees with the tracked skill")]
    OutOfStep { worker: ParticipantId, period: usize },

    #[error("Expected outcomes for {expected} workers, found {found}")]
    MissingOutcomes { expected: usize, found: usize },
}

/// Skill state of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub level: u32,
    /// Set by training; applied at the start of the next period
    pub pending_increase: bool,
}

/// A level change applied at a period boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillChange {
    pub worker: ParticipantId,
    pub from: u32,
    pub to: u32,
}

/// Per-worker skill levels for a session
///
/// # Example
/// ```
/// use labor_market_core::SkillTracker;
///
/// let mut skills = SkillTracker::new(3).unwrap();
/// skills.assign(4, 2).unwrap();
/// assert_eq!(skills.level(4), Some(2));
/// assert_eq!(skills.next_level(4), Some(2));
///
/// // Without a training flag the boundary leaves the level alone
/// assert!(skills.advance_period().is_empty());
/// assert_eq!(skills.level(4), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillTracker {
    max_level: u32,
    records: BTreeMap<ParticipantId, SkillRecord>,
}

impl SkillTracker {
    pub fn new(max_level: u32) -> Result<Self, SkillError> {
        if max_level == 0 {
            return Err(SkillError::NoLevels);
        }
        Ok(Self {
            max_level,
            records: BTreeMap::new(),
        })
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Set a worker's starting level
    pub fn assign(&mut self, worker: ParticipantId, level: u32) -> Result<(), SkillError> {
        if level == 0 || level > self.max_level {
            return Err(SkillError::LevelOutOfRange {
                worker,
                level,
                max_level: self.max_level,
            });
        }
        self.records.insert(
            worker,
            SkillRecord {
                level,
                pending_increase: false,
            },
        );
        Ok(())
    }

    pub fn level(&self, worker: ParticipantId) -> Option<u32> {
        self.records.get(&worker).map(|r| r.level)
    }

    pub fn record(&self, worker: ParticipantId) -> Option<&SkillRecord> {
        self.records.get(&worker)
    }

    pub fn records(&self) -> &BTreeMap<ParticipantId, SkillRecord> {
        &self.records
    }

    pub fn has_pending_increase(&self, worker: ParticipantId) -> bool {
        self.records
            .get(&worker)
            .is_some_and(|r| r.pending_increase)
    }

    /// Level the worker will have next period
    pub fn next_level(&self, worker: ParticipantId) -> Option<u32> {
        self.records.get(&worker).map(|r| {
            if r.pending_increase {
                (r.level + 1).min(self.max_level)
            } else {
                r.level
            }
        })
    }

    /// Mark a worker for a one-level increase at the next period start
    pub(crate) fn flag_increase(&mut self, worker: ParticipantId) -> Result<(), SkillError> {
        let record = self
            .records
            .get_mut(&worker)
            .ok_or(SkillError::UnknownWorker(worker))?;
        record.pending_increase = true;
        Ok(())
    }

    /// Carry every worker's skill out of last period's outcomes
    ///
    /// Each worker outcome must agree with the tracker on the level played
    /// and on whether training earned an increase; the increases are then
    /// applied as in [`SkillTracker::advance_period`].
    pub fn carry_forward<'o>(
        &mut self,
        previous: impl IntoIterator<Item = &'o PeriodOutcome>,
    ) -> Result<Vec<SkillChange>, SkillError> {
        let mut found = 0;
        for outcome in previous.into_iter().filter(|o| o.role.is_worker()) {
            let worker = outcome.participant;
            let record = self
                .records
                .get(&worker)
                .ok_or(SkillError::UnknownWorker(worker))?;
            if outcome.skill != Some(record.level) || outcome.skill_increase != record.pending_increase {
                return Err(SkillError::OutOfStep {
                    worker,
                    period: outcome.period,
                });
            }
            found += 1;
        }
        if found != self.records.len() {
            return Err(SkillError::MissingOutcomes {
                expected: self.records.len(),
                found,
            });
        }
        Ok(self.advance_period())
    }

    /// Apply all pending increases (capped) and clear the flags
    ///
    /// Returns the workers whose level actually changed. A flagged worker
    /// already at `max_level` keeps their level and is not reported.
    pub fn advance_period(&mut self) -> Vec<SkillChange> {
        let max_level = self.max_level;
        let mut changes = Vec::new();
        for (&worker, record) in self.records.iter_mut() {
            if !record.pending_increase {
                continue;
            }
            record.pending_increase = false;
            let to = (record.level + 1).min(max_level);
            if to != record.level {
                changes.push(SkillChange {
                    worker,
                    from: record.level,
                    to,
                });
                record.level = to;
            }
        }
        changes
    }
}
