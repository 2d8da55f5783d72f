//! Matching Engine
//!
//! Runs the hiring phase of one period as a sequence of rounds. Each round
//! has two barriers:
//!
//! ```text
//! For each round r in 1..=hiring_steps:
//! 1. Offers barrier    - every Offering employer with eligible workers
//!                        submits an offer, withdraws, or times out
//! 2. Write offers      - one open Offer per submitted offer
//! 3. Responses barrier - every unmatched worker with open offers accepts
//!                        one, rejects all, or times out (= reject all)
//! 4. Resolve           - accepted offer becomes the contract, every other
//!                        open offer to that worker is rejected
//! 5. Finish round      - advance the counter, mark exhausted employers,
//!                        check termination
//! ```
//!
//! The engine is the only writer of offer status transitions and of the
//! participants' match pointers. Every submitted action is re-validated
//! before anything is written, so a boundary bug surfaces as a
//! `MatchingError` instead of a corrupted ledger.

use crate::core::config::MarketConfig;
use crate::matching::actions::{EmployerAction, WorkerChoice};
use crate::matching::barrier::{BarrierStage, RoundBarrier, Submission};
use crate::models::event::{Event, EventLog, RejectionReason, TimeoutDefault};
use crate::models::ledger::{LedgerError, OfferLedger};
use crate::models::offer::OfferId;
use crate::models::participant::{EmployerState, ParticipantId, WorkerState};
use crate::models::state::MarketState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Protocol violations detected by the engine
///
/// All of these indicate a bug upstream of the engine and are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum MatchingError {
    #[error("Participant {0} is not an employer in this period")]
    UnknownEmployer(ParticipantId),

    #[error("Participant {0} is not a worker in this period")]
    UnknownWorker(ParticipantId),

    #[error("Employer {employer} cannot act in state {state:?}")]
    EmployerNotOffering {
        employer: ParticipantId,
        state: EmployerState,
    },

    #[error("Worker {worker} cannot respond in state {state:?}")]
    WorkerNotAwaiting {
        worker: ParticipantId,
        state: WorkerState,
    },

    #[error("Wage {wage} from employer {employer} is outside 1..={max_wage}")]
    WageOutOfBounds {
        employer: ParticipantId,
        wage: i64,
        max_wage: i64,
    },

    #[error("Worker {worker} is not eligible for an offer from employer {employer} in period {period}")]
    IneligibleWorker {
        employer: ParticipantId,
        worker: ParticipantId,
        period: usize,
    },

    #[error("Worker {worker} has no open offer from employer {employer}")]
    NoOpenOffer {
        worker: ParticipantId,
        employer: ParticipantId,
    },

    #[error("Participant {participant} acted at the {stage:?} barrier without being asked")]
    UnexpectedSubmission {
        participant: ParticipantId,
        stage: BarrierStage,
    },

    #[error("Hiring phase of period {0} has already finished")]
    HiringFinished(usize),

    #[error("Participant {0} is missing from the market state")]
    MissingParticipant(ParticipantId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// What happened in one completed hiring round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub period: usize,
    pub round: usize,
    pub offers_made: Vec<OfferId>,
    pub accepted: Vec<OfferId>,
    pub rejected: Vec<OfferId>,
    pub withdrawn: Vec<ParticipantId>,
    pub timed_out: Vec<ParticipantId>,
}

/// Hiring-phase state machine for one period
///
/// # Example
///
/// ```rust
/// use labor_market_core::matching::{EmployerAction, MatchingEngine, WorkerChoice};
/// use labor_market_core::{EventLog, MarketConfig, MarketState, OfferLedger, Participant, Role};
///
/// let config = MarketConfig { num_employers: 1, num_workers: 1, starting_skills: vec![1], hiring_steps: 3, ..MarketConfig::default() };
/// let mut state = MarketState::new(vec![
///     Participant::new(1, Role::Employer, "Acme".to_string()).unwrap(),
///     Participant::new(2, Role::Worker, "Sam".to_string()).unwrap(),
/// ])
/// .unwrap();
/// let mut ledger = OfferLedger::new();
/// let mut events = EventLog::new();
/// let mut engine = MatchingEngine::new(1, config.hiring_steps, &[1], &[2]);
///
/// let mut offers = engine.open_offer_barrier(&ledger, &mut events);
/// offers.submit(1, EmployerAction::Offer { worker: 2, wage: 100, training: false }).unwrap();
/// engine.apply_offers(offers.close().unwrap(), &mut ledger, &config, &mut events).unwrap();
///
/// let mut responses = engine.open_response_barrier(&ledger);
/// responses.submit(2, WorkerChoice::Accept(1)).unwrap();
/// engine.apply_responses(responses.close().unwrap(), &mut ledger, &mut state, &mut events).unwrap();
///
/// let summary = engine.finish_round(&ledger, &mut state, &mut events);
/// assert_eq!(summary.accepted.len(), 1);
/// assert!(engine.is_finished());
/// assert_eq!(engine.contracts(), vec![(1, 2)]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingEngine {
    period: usize,
    hiring_steps: usize,
    round: usize,
    employers: BTreeMap<ParticipantId, EmployerState>,
    workers: BTreeMap<ParticipantId, WorkerState>,
    finished: bool,

    /// Accumulates what happens in the round in progress
    current: RoundSummary,
}

impl MatchingEngine {
    pub fn new(
        period: usize,
        hiring_steps: usize,
        employers: &[ParticipantId],
        workers: &[ParticipantId],
    ) -> Self {
        Self {
            period,
            hiring_steps,
            round: 1,
            employers: employers
                .iter()
                .map(|&id| (id, EmployerState::Offering))
                .collect(),
            workers: workers
                .iter()
                .map(|&id| (id, WorkerState::Awaiting))
                .collect(),
            finished: false,
            current: RoundSummary {
                period,
                round: 1,
                ..RoundSummary::default()
            },
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn period(&self) -> usize {
        self.period
    }

    /// Current hiring round (1-based)
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn employer_state(&self, employer: ParticipantId) -> Option<EmployerState> {
        self.employers.get(&employer).copied()
    }

    pub fn worker_state(&self, worker: ParticipantId) -> Option<WorkerState> {
        self.workers.get(&worker).copied()
    }

    /// Matched (employer, worker) pairs, ordered by employer id
    pub fn contracts(&self) -> Vec<(ParticipantId, ParticipantId)> {
        self.employers
            .iter()
            .filter_map(|(&employer, state)| match state {
                EmployerState::Matched(worker) => Some((employer, *worker)),
                _ => None,
            })
            .collect()
    }

    /// Workers the employer may make an offer to right now
    ///
    /// Unmatched workers minus those who already rejected this employer in
    /// the current period. Empty unless the employer is still `Offering`.
    pub fn eligible_workers(&self, employer: ParticipantId, ledger: &OfferLedger) -> Vec<ParticipantId> {
        if self.employer_state(employer) != Some(EmployerState::Offering) {
            return Vec::new();
        }
        self.workers
            .iter()
            .filter(|(_, state)| **state == WorkerState::Awaiting)
            .map(|(&worker, _)| worker)
            .filter(|&worker| !ledger.is_excluded(self.period, employer, worker))
            .collect()
    }

    // ========================================================================
    // Offers barrier
    // ========================================================================

    /// Open the offers barrier of the current round
    ///
    /// Employers left without eligible workers become `Exhausted` here and
    /// are skipped, as is everyone else who has nothing to submit.
    pub fn open_offer_barrier(
        &mut self,
        ledger: &OfferLedger,
        events: &mut EventLog,
    ) -> RoundBarrier<EmployerAction> {
        self.mark_exhausted_employers(ledger, events);

        let active: Vec<ParticipantId> = self
            .employers
            .iter()
            .filter(|(_, state)| **state == EmployerState::Offering)
            .map(|(&id, _)| id)
            .collect();

        events.log(Event::HiringRoundOpened {
            period: self.period,
            round: self.round,
            active_employers: active.clone(),
        });

        let skipped = self
            .employers
            .keys()
            .chain(self.workers.keys())
            .copied()
            .filter(|id| !active.contains(id))
            .collect::<Vec<_>>();

        RoundBarrier::new(BarrierStage::Offers, active, skipped)
    }

    /// Write the offers collected at the offers barrier
    ///
    /// Every submission is validated before the first write.
    pub fn apply_offers(
        &mut self,
        submissions: BTreeMap<ParticipantId, Submission<EmployerAction>>,
        ledger: &mut OfferLedger,
        config: &MarketConfig,
        events: &mut EventLog,
    ) -> Result<Vec<OfferId>, MatchingError> {
        self.ensure_running()?;

        for (&employer, submission) in &submissions {
            match submission {
                Submission::Skipped => {}
                Submission::TimedOut => {
                    self.ensure_offering(employer)?;
                }
                Submission::Acted(EmployerAction::Withdraw) => {
                    self.ensure_offering(employer)?;
                }
                Submission::Acted(EmployerAction::Offer { worker, wage, .. }) => {
                    self.ensure_offering(employer)?;
                    if !config.wage_in_bounds(*wage) {
                        return Err(MatchingError::WageOutOfBounds {
                            employer,
                            wage: *wage,
                            max_wage: config.max_wage,
                        });
                    }
                    if !self.eligible_workers(employer, ledger).contains(worker) {
                        return Err(MatchingError::IneligibleWorker {
                            employer,
                            worker: *worker,
                            period: self.period,
                        });
                    }
                }
            }
        }

        let mut created = Vec::new();
        for (employer, submission) in submissions {
            match submission {
                Submission::Skipped => {}
                Submission::TimedOut => {
                    self.current.timed_out.push(employer);
                    events.log(Event::ParticipantTimedOut {
                        period: self.period,
                        round: Some(self.round),
                        participant: employer,
                        stage: BarrierStage::Offers,
                        applied: TimeoutDefault::NoOffer,
                    });
                }
                Submission::Acted(EmployerAction::Withdraw) => {
                    self.employers.insert(employer, EmployerState::Withdrawn);
                    self.current.withdrawn.push(employer);
                    events.log(Event::OffersWithdrawn {
                        period: self.period,
                        round: self.round,
                        employer,
                    });
                }
                Submission::Acted(EmployerAction::Offer {
                    worker,
                    wage,
                    training,
                }) => {
                    let offer_id =
                        ledger.create(self.period, self.round, employer, worker, wage, training)?;
                    created.push(offer_id);
                    events.log(Event::OfferMade {
                        period: self.period,
                        round: self.round,
                        offer_id,
                        employer,
                        worker,
                        wage,
                        training,
                    });
                }
            }
        }

        self.current.offers_made.extend(created.iter().copied());
        Ok(created)
    }

    // ========================================================================
    // Responses barrier
    // ========================================================================

    /// Open the responses barrier: unmatched workers with open offers act
    pub fn open_response_barrier(&self, ledger: &OfferLedger) -> RoundBarrier<WorkerChoice> {
        let active: Vec<ParticipantId> = self
            .workers
            .iter()
            .filter(|(_, state)| **state == WorkerState::Awaiting)
            .map(|(&id, _)| id)
            .filter(|&worker| !ledger.open_offers_for(self.period, worker).is_empty())
            .collect();

        let skipped = self
            .employers
            .keys()
            .chain(self.workers.keys())
            .copied()
            .filter(|id| !active.contains(id))
            .collect::<Vec<_>>();

        RoundBarrier::new(BarrierStage::Responses, active, skipped)
    }

    /// Resolve every open offer of the round
    ///
    /// Acceptance matches both sides and supersedes the worker's other open
    /// offers; reject-all and timeouts reject every open offer to the worker.
    pub fn apply_responses(
        &mut self,
        submissions: BTreeMap<ParticipantId, Submission<WorkerChoice>>,
        ledger: &mut OfferLedger,
        state: &mut MarketState,
        events: &mut EventLog,
    ) -> Result<(), MatchingError> {
        self.ensure_running()?;

        for (&worker, submission) in &submissions {
            let open = ledger.open_offers_for(self.period, worker);
            match submission {
                Submission::Skipped => {
                    if !open.is_empty() {
                        return Err(MatchingError::UnexpectedSubmission {
                            participant: worker,
                            stage: BarrierStage::Responses,
                        });
                    }
                }
                Submission::TimedOut | Submission::Acted(WorkerChoice::RejectAll) => {
                    self.ensure_awaiting(worker)?;
                }
                Submission::Acted(WorkerChoice::Accept(employer)) => {
                    self.ensure_awaiting(worker)?;
                    if !open.iter().any(|o| o.employer() == *employer) {
                        return Err(MatchingError::NoOpenOffer {
                            worker,
                            employer: *employer,
                        });
                    }
                    if self.employer_state(*employer) != Some(EmployerState::Offering) {
                        return Err(MatchingError::EmployerNotOffering {
                            employer: *employer,
                            state: self
                                .employer_state(*employer)
                                .unwrap_or(EmployerState::Exhausted),
                        });
                    }
                }
            }
        }

        for (worker, submission) in submissions {
            let open: Vec<(OfferId, ParticipantId)> = ledger
                .open_offers_for(self.period, worker)
                .iter()
                .map(|o| (o.id(), o.employer()))
                .collect();

            let (accepted_employer, reason) = match submission {
                Submission::Skipped => continue,
                Submission::TimedOut => {
                    self.current.timed_out.push(worker);
                    events.log(Event::ParticipantTimedOut {
                        period: self.period,
                        round: Some(self.round),
                        participant: worker,
                        stage: BarrierStage::Responses,
                        applied: TimeoutDefault::RejectAll,
                    });
                    (None, RejectionReason::TimedOut)
                }
                Submission::Acted(WorkerChoice::RejectAll) => (None, RejectionReason::Declined),
                Submission::Acted(WorkerChoice::Accept(employer)) => {
                    (Some(employer), RejectionReason::Superseded)
                }
            };

            for (offer_id, employer) in open {
                if Some(employer) == accepted_employer {
                    ledger.accept(offer_id)?;
                    self.match_pair(employer, worker, state)?;
                    self.current.accepted.push(offer_id);
                    events.log(Event::OfferAccepted {
                        period: self.period,
                        round: self.round,
                        offer_id,
                        employer,
                        worker,
                    });
                } else {
                    ledger.reject(offer_id)?;
                    self.current.rejected.push(offer_id);
                    events.log(Event::OfferRejected {
                        period: self.period,
                        round: self.round,
                        offer_id,
                        employer,
                        worker,
                        reason,
                    });
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Round completion
    // ========================================================================

    /// Cross the end-of-round barrier
    ///
    /// Advances the round counter (also on every unmatched participant),
    /// marks employers without eligible workers as exhausted, and closes the
    /// hiring phase when every employer is in a terminal state or the round
    /// limit is reached. Returns the summary of the round just finished.
    pub fn finish_round(
        &mut self,
        ledger: &OfferLedger,
        state: &mut MarketState,
        events: &mut EventLog,
    ) -> RoundSummary {
        let summary = std::mem::take(&mut self.current);
        if self.finished {
            return summary;
        }

        self.round += 1;
        self.current.period = self.period;
        self.current.round = self.round;
        for id in self.employers.keys().chain(self.workers.keys()) {
            if let Some(participant) = state.get_mut(*id) {
                if !participant.is_matched() {
                    participant.set_hiring_round(self.round);
                }
            }
        }

        self.mark_exhausted_employers(ledger, events);

        let all_employers_done = self.employers.values().all(|s| s.is_terminal());
        if all_employers_done || self.round > self.hiring_steps {
            self.close(events);
        }

        summary
    }

    /// End the hiring phase: every non-terminal participant becomes exhausted
    fn close(&mut self, events: &mut EventLog) {
        let last_round = self.round.min(self.hiring_steps);
        for (&employer, state) in self.employers.iter_mut() {
            if *state == EmployerState::Offering {
                *state = EmployerState::Exhausted;
                events.log(Event::EmployerExhausted {
                    period: self.period,
                    round: last_round,
                    employer,
                });
            }
        }
        for state in self.workers.values_mut() {
            if *state == WorkerState::Awaiting {
                *state = WorkerState::Exhausted;
            }
        }
        self.finished = true;

        events.log(Event::HiringClosed {
            period: self.period,
            rounds_used: self.round - 1,
            matched_pairs: self.contracts().len(),
        });
    }

    fn mark_exhausted_employers(&mut self, ledger: &OfferLedger, events: &mut EventLog) {
        let exhausted: Vec<ParticipantId> = self
            .employers
            .iter()
            .filter(|(_, state)| **state == EmployerState::Offering)
            .map(|(&id, _)| id)
            .filter(|&id| self.eligible_workers(id, ledger).is_empty())
            .collect();

        for employer in exhausted {
            self.employers.insert(employer, EmployerState::Exhausted);
            events.log(Event::EmployerExhausted {
                period: self.period,
                round: self.round.min(self.hiring_steps),
                employer,
            });
        }
    }

    fn match_pair(
        &mut self,
        employer: ParticipantId,
        worker: ParticipantId,
        state: &mut MarketState,
    ) -> Result<(), MatchingError> {
        self.employers
            .insert(employer, EmployerState::Matched(worker));
        self.workers.insert(worker, WorkerState::Matched(employer));

        state
            .get_mut(employer)
            .ok_or(MatchingError::MissingParticipant(employer))?
            .set_matched_with(worker);
        state
            .get_mut(worker)
            .ok_or(MatchingError::MissingParticipant(worker))?
            .set_matched_with(employer);
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), MatchingError> {
        if self.finished {
            return Err(MatchingError::HiringFinished(self.period));
        }
        Ok(())
    }

    fn ensure_offering(&self, employer: ParticipantId) -> Result<(), MatchingError> {
        match self.employer_state(employer) {
            None => Err(MatchingError::UnknownEmployer(employer)),
            Some(EmployerState::Offering) => Ok(()),
            Some(state) => Err(MatchingError::EmployerNotOffering { employer, state }),
        }
    }

    fn ensure_awaiting(&self, worker: ParticipantId) -> Result<(), MatchingError> {
        match self.worker_state(worker) {
            None => Err(MatchingError::UnknownWorker(worker)),
            Some(WorkerState::Awaiting) => Ok(()),
            Some(state) => Err(MatchingError::WorkerNotAwaiting { worker, state }),
        }
    }
}
