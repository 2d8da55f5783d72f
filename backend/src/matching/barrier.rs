//! Round barrier
//!
//! A synchronous synchronization point. The barrier is created with every
//! participant of the group: those who must act are *active*, everyone
//! else is recorded as *skipped* up front and counts toward completion
//! without doing anything. The barrier completes once every active
//! participant has submitted an action or timed out.
//!
//! Submissions are write-only from the outside: nobody can read another
//! participant's in-round action before the barrier is closed.

use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Which protocol step a barrier guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BarrierStage {
    /// Employers submit offers (hiring round, first half)
    Offers,
    /// Workers accept or reject open offers (hiring round, second half)
    Responses,
    /// Matched workers choose effort
    Effort,
    /// Everyone acknowledges the period results
    Results,
}

/// What a participant contributed to a barrier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Submission<A> {
    Acted(A),
    /// Missed the deadline; the caller applies the stage's default
    TimedOut,
    /// Had nothing to do at this barrier
    Skipped,
}

/// Barrier misuse
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BarrierError {
    #[error("Participant {participant} has no action to take at the {stage:?} barrier")]
    NotExpected {
        participant: ParticipantId,
        stage: BarrierStage,
    },

    #[error("Participant {participant} already submitted at the {stage:?} barrier")]
    AlreadySubmitted {
        participant: ParticipantId,
        stage: BarrierStage,
    },

    #[error("{stage:?} barrier is still waiting for {pending:?}")]
    Incomplete {
        stage: BarrierStage,
        pending: Vec<ParticipantId>,
    },
}

/// Collects one submission per participant for a single protocol step
///
/// # Example
/// ```
/// use labor_market_core::matching::{BarrierStage, RoundBarrier, Submission};
///
/// let mut barrier: RoundBarrier<u32> = RoundBarrier::new(BarrierStage::Effort, [4, 5], [1, 2]);
/// assert_eq!(barrier.pending(), vec![4, 5]);
///
/// barrier.submit(4, 7).unwrap();
/// barrier.time_out(5).unwrap();
/// assert!(barrier.is_complete());
///
/// let closed = barrier.close().unwrap();
/// assert_eq!(closed[&4], Submission::Acted(7));
/// assert_eq!(closed[&5], Submission::TimedOut);
/// assert_eq!(closed[&1], Submission::Skipped);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundBarrier<A> {
    stage: BarrierStage,
    /// `None` = active participant that has not submitted yet
    slots: BTreeMap<ParticipantId, Option<Submission<A>>>,
}

impl<A> RoundBarrier<A> {
    pub fn new(
        stage: BarrierStage,
        active: impl IntoIterator<Item = ParticipantId>,
        skipped: impl IntoIterator<Item = ParticipantId>,
    ) -> Self {
        let mut slots = BTreeMap::new();
        for participant in skipped {
            slots.insert(participant, Some(Submission::Skipped));
        }
        for participant in active {
            slots.insert(participant, None);
        }
        Self { stage, slots }
    }

    pub fn stage(&self) -> BarrierStage {
        self.stage
    }

    /// Whether the participant must act at this barrier
    pub fn is_active(&self, participant: ParticipantId) -> bool {
        !matches!(
            self.slots.get(&participant),
            None | Some(Some(Submission::Skipped))
        )
    }

    /// Whether the participant has already acted or timed out
    pub fn has_submitted(&self, participant: ParticipantId) -> bool {
        matches!(
            self.slots.get(&participant),
            Some(Some(Submission::Acted(_))) | Some(Some(Submission::TimedOut))
        )
    }

    /// Participants that must act, in id order
    pub fn active(&self) -> Vec<ParticipantId> {
        self.slots
            .keys()
            .copied()
            .filter(|&id| self.is_active(id))
            .collect()
    }

    /// Active participants that have not yet submitted, in id order
    pub fn pending(&self) -> Vec<ParticipantId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_none())
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.values().all(Option::is_some)
    }

    pub fn submit(&mut self, participant: ParticipantId, action: A) -> Result<(), BarrierError> {
        let slot = self.pending_slot(participant)?;
        *slot = Some(Submission::Acted(action));
        Ok(())
    }

    pub fn time_out(&mut self, participant: ParticipantId) -> Result<(), BarrierError> {
        let slot = self.pending_slot(participant)?;
        *slot = Some(Submission::TimedOut);
        Ok(())
    }

    /// Time out every participant still pending; returns who was defaulted
    pub fn time_out_pending(&mut self) -> Vec<ParticipantId> {
        let pending = self.pending();
        for participant in &pending {
            self.slots.insert(*participant, Some(Submission::TimedOut));
        }
        pending
    }

    /// Close the barrier and hand out every submission
    ///
    /// # Errors
    /// `Incomplete` if any active participant has not submitted
    pub fn close(self) -> Result<BTreeMap<ParticipantId, Submission<A>>, BarrierError> {
        let pending = self.pending();
        if !pending.is_empty() {
            return Err(BarrierError::Incomplete {
                stage: self.stage,
                pending,
            });
        }
        Ok(self
            .slots
            .into_iter()
            .filter_map(|(id, slot)| slot.map(|submission| (id, submission)))
            .collect())
    }

    fn pending_slot(
        &mut self,
        participant: ParticipantId,
    ) -> Result<&mut Option<Submission<A>>, BarrierError> {
        let stage = self.stage;
        match self.slots.get_mut(&participant) {
            None | Some(Some(Submission::Skipped)) => {
                Err(BarrierError::NotExpected { participant, stage })
            }
            Some(Some(_)) => Err(BarrierError::AlreadySubmitted { participant, stage }),
            Some(slot) => Ok(slot),
        }
    }
}
