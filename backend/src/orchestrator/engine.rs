//! Session Engine - period scheduler
//!
//! Sequences the periods of one market group and owns every piece of
//! session state:
//! - Group composition (roles, labels) fixed at construction
//! - Skill levels (assigned in period 1, carried forward at period start)
//! - Offer ledger, outcome arena and event log (append-only)
//! - The barrier currently open and the phase it belongs to
//!
//! # Architecture
//!
//! ```text
//! For each period p in 1..=num_periods:
//! 1. Period start   - assign starting skills (p = 1) or apply pending
//!                     skill increases (p > 1); reset match pointers
//! 2. Hiring         - MatchingEngine rounds, two barriers per round
//!                     (offers, responses), until hiring closes
//! 3. Work           - effort barrier for matched workers only
//!                     (timeout = effort 1)
//! 4. Payoff         - PayoffEngine writes one PeriodOutcome per participant
//! 5. Results        - acknowledgement barrier for everyone
//! ```
//!
//! The host submits actions (or timeouts) for the open barrier and calls
//! [`Session::advance`], which crosses every complete barrier and stops at
//! the first one still waiting for input.
//!
//! # Example
//!
//! ```rust
//! use labor_market_core::matching::{EmployerAction, WorkerChoice};
//! use labor_market_core::orchestrator::{Advance, Session};
//! use labor_market_core::MarketConfig;
//!
//! let config = MarketConfig {
//!     num_periods: 1,
//!     hiring_steps: 3,
//!     num_employers: 1,
//!     num_workers: 1,
//!     starting_skills: vec![1],
//!     ..MarketConfig::default()
//! };
//! let mut session = Session::new(config).unwrap();
//!
//! session.advance().unwrap();
//! session
//!     .submit_offer(1, EmployerAction::Offer { worker: 2, wage: 100, training: false })
//!     .unwrap();
//! session.advance().unwrap();
//! session.submit_response(2, WorkerChoice::Accept(1)).unwrap();
//! session.advance().unwrap();
//! session.submit_effort(2, 3).unwrap();
//! session.advance().unwrap();
//! session.acknowledge(1).unwrap();
//! session.acknowledge(2).unwrap();
//!
//! assert_eq!(session.advance().unwrap(), Advance::Finished);
//! assert_eq!(session.payoff_history(1), vec![800 + 300 - 100]);
//! assert_eq!(session.payoff_history(2), vec![400 + 100 - 40]);
//! ```

use crate::core::config::{ConfigError, MarketConfig};
use crate::core::time::PeriodClock;
use crate::matching::{
    BarrierError, BarrierStage, EmployerAction, MatchingEngine, MatchingError, RoundBarrier,
    RoundSummary, Submission, WorkerChoice,
};
use crate::models::event::{Event, EventLog, TimeoutDefault};
use crate::models::ledger::{LedgerError, OfferLedger};
use crate::models::offer::Offer;
use crate::models::outcome::{OutcomeArena, PeriodOutcome};
use crate::models::participant::{Participant, ParticipantError, ParticipantId, Role};
use crate::models::state::MarketState;
use crate::orchestrator::checkpoint::{compute_config_hash, SessionSnapshot};
use crate::payoff::{EffortProjection, PayoffEngine, PayoffError, SkillTableRow};
use crate::rng::RngManager;
use crate::skills::{SkillError, SkillTracker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Phases and barriers
// ============================================================================

/// Where the session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    NotStarted,
    HiringOffers { period: usize, round: usize },
    HiringResponses { period: usize, round: usize },
    Work { period: usize },
    Results { period: usize },
    Finished,
}

impl SessionPhase {
    /// Barrier stage open in this phase, if any
    pub fn stage(&self) -> Option<BarrierStage> {
        match self {
            SessionPhase::HiringOffers { .. } => Some(BarrierStage::Offers),
            SessionPhase::HiringResponses { .. } => Some(BarrierStage::Responses),
            SessionPhase::Work { .. } => Some(BarrierStage::Effort),
            SessionPhase::Results { .. } => Some(BarrierStage::Results),
            SessionPhase::NotStarted | SessionPhase::Finished => None,
        }
    }

    pub fn period(&self) -> Option<usize> {
        match *self {
            SessionPhase::HiringOffers { period, .. }
            | SessionPhase::HiringResponses { period, .. }
            | SessionPhase::Work { period }
            | SessionPhase::Results { period } => Some(period),
            SessionPhase::NotStarted | SessionPhase::Finished => None,
        }
    }

    /// Hiring round, during the hiring phase only
    pub fn round(&self) -> Option<usize> {
        match *self {
            SessionPhase::HiringOffers { round, .. } | SessionPhase::HiringResponses { round, .. } => {
                Some(round)
            }
            _ => None,
        }
    }
}

/// The barrier currently collecting submissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActiveBarrier {
    Idle,
    Offers(RoundBarrier<EmployerAction>),
    Responses(RoundBarrier<WorkerChoice>),
    Effort(RoundBarrier<u32>),
    Results(RoundBarrier<()>),
}

impl ActiveBarrier {
    fn pending(&self) -> Vec<ParticipantId> {
        match self {
            ActiveBarrier::Idle => Vec::new(),
            ActiveBarrier::Offers(b) => b.pending(),
            ActiveBarrier::Responses(b) => b.pending(),
            ActiveBarrier::Effort(b) => b.pending(),
            ActiveBarrier::Results(b) => b.pending(),
        }
    }

    fn is_active(&self, participant: ParticipantId) -> bool {
        match self {
            ActiveBarrier::Idle => false,
            ActiveBarrier::Offers(b) => b.is_active(participant),
            ActiveBarrier::Responses(b) => b.is_active(participant),
            ActiveBarrier::Effort(b) => b.is_active(participant),
            ActiveBarrier::Results(b) => b.is_active(participant),
        }
    }

    fn has_submitted(&self, participant: ParticipantId) -> bool {
        match self {
            ActiveBarrier::Idle => false,
            ActiveBarrier::Offers(b) => b.has_submitted(participant),
            ActiveBarrier::Responses(b) => b.has_submitted(participant),
            ActiveBarrier::Effort(b) => b.has_submitted(participant),
            ActiveBarrier::Results(b) => b.has_submitted(participant),
        }
    }

    fn time_out(&mut self, participant: ParticipantId) -> Result<(), BarrierError> {
        match self {
            ActiveBarrier::Idle => Ok(()),
            ActiveBarrier::Offers(b) => b.time_out(participant),
            ActiveBarrier::Responses(b) => b.time_out(participant),
            ActiveBarrier::Effort(b) => b.time_out(participant),
            ActiveBarrier::Results(b) => b.time_out(participant),
        }
    }

    fn time_out_pending(&mut self) -> Vec<ParticipantId> {
        match self {
            ActiveBarrier::Idle => Vec::new(),
            ActiveBarrier::Offers(b) => b.time_out_pending(),
            ActiveBarrier::Responses(b) => b.time_out_pending(),
            ActiveBarrier::Effort(b) => b.time_out_pending(),
            ActiveBarrier::Results(b) => b.time_out_pending(),
        }
    }
}

/// Result of [`Session::advance`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advance {
    /// The open barrier needs input from these participants
    Waiting {
        phase: SessionPhase,
        pending: Vec<ParticipantId>,
    },
    /// Every period has been played
    Finished,
}

// ============================================================================
// Errors
// ============================================================================

/// Session-level errors
///
/// Boundary rejections (`InvalidAction`, `WrongPhase`,
/// `UnknownParticipant`, unexpected or repeated barrier submissions) leave
/// the session untouched. Everything else is a fatal fault.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger invariant violated: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Skill tracking failed: {0}")]
    Skill(#[from] SkillError),

    #[error("Invalid group: {0}")]
    Participant(#[from] ParticipantError),

    #[error("Barrier error: {0}")]
    Barrier(#[from] BarrierError),

    #[error("Matching protocol violated: {0}")]
    Matching(#[from] MatchingError),

    #[error("Payoff computation failed: {0}")]
    Payoff(#[from] PayoffError),

    #[error("Invalid action from participant {participant}: {reason}")]
    InvalidAction {
        participant: ParticipantId,
        reason: String,
    },

    #[error("Cannot {action} during {phase:?}")]
    WrongPhase {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("Unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Config mismatch: snapshot was taken with config {expected}, got {actual}")]
    ConfigMismatch { expected: String, actual: String },
}

impl SimulationError {
    /// Whether the session can no longer be trusted after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SimulationError::InvalidAction { .. }
                | SimulationError::WrongPhase { .. }
                | SimulationError::UnknownParticipant(_)
                | SimulationError::Barrier(BarrierError::NotExpected { .. })
                | SimulationError::Barrier(BarrierError::AlreadySubmitted { .. })
        )
    }

    /// No failure clears up by retrying the same call
    pub fn is_retryable(&self) -> bool {
        false
    }
}

fn missing_engine() -> SimulationError {
    SimulationError::InvariantViolation("hiring phase has no matching engine".to_string())
}

// ============================================================================
// Views and reports
// ============================================================================

/// One worker as seen from an employer's offer form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerView {
    pub worker: ParticipantId,
    pub label: String,
    pub skill: Option<u32>,
    pub matched: bool,
    /// Rejected this employer earlier in the period
    pub rejected_you: bool,
    /// May receive an offer from this employer now
    pub eligible: bool,
}

/// What an employer can do in the current hiring round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerOptions {
    pub period: usize,
    pub round: usize,
    /// The offers barrier is waiting for this employer
    pub must_act: bool,
    pub max_wage: i64,
    pub workers: Vec<WorkerView>,
}

/// What a worker can do in the current hiring round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerOptions {
    pub period: usize,
    pub round: usize,
    pub must_act: bool,
    pub skill: Option<u32>,
    /// Open offers addressed to the worker, in creation order
    pub offers: Vec<Offer>,
}

/// End-of-session summary for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantReport {
    pub id: ParticipantId,
    pub role: Role,
    pub label: String,
    pub payoffs: Vec<i64>,
    pub total_payoff: i64,
    /// Current skill level (workers only)
    pub skill: Option<u32>,
    pub timeouts: usize,
}

/// Payoff history of the whole group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub periods_completed: usize,
    pub finished: bool,
    pub offers_made: usize,
    pub contracts: usize,
    pub participants: Vec<ParticipantReport>,
}

// ============================================================================
// Session
// ============================================================================

/// One market group playing through every period
pub struct Session {
    config: MarketConfig,
    state: MarketState,
    skills: SkillTracker,
    ledger: OfferLedger,
    outcomes: OutcomeArena,
    clock: PeriodClock,
    phase: SessionPhase,
    matching: Option<MatchingEngine>,
    barrier: ActiveBarrier,
    efforts: BTreeMap<ParticipantId, u32>,
    rounds: Vec<RoundSummary>,
    rng: RngManager,
    events: EventLog,
}

impl Session {
    /// Create a session from configuration
    ///
    /// Validates the configuration, assigns roles (optionally shuffled with
    /// the seeded RNG) and draws display labels. Nothing is played until
    /// the first [`Session::advance`].
    pub fn new(config: MarketConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut rng = RngManager::new(config.rng_seed);

        let mut slots: Vec<ParticipantId> = (1..=config.group_size() as ParticipantId).collect();
        if config.randomize_roles {
            rng.shuffle(&mut slots);
        }
        let (employer_slots, worker_slots) = slots.split_at(config.num_employers);
        let mut employer_ids = employer_slots.to_vec();
        let mut worker_ids = worker_slots.to_vec();
        employer_ids.sort_unstable();
        worker_ids.sort_unstable();

        let employer_labels = draw_labels(
            &config.employer_labels,
            "employer_labels",
            "Employer",
            employer_ids.len(),
            &mut rng,
        )?;
        let worker_labels = draw_labels(
            &config.worker_labels,
            "worker_labels",
            "Worker",
            worker_ids.len(),
            &mut rng,
        )?;

        let participants = employer_ids
            .iter()
            .zip(employer_labels)
            .map(|(&id, label)| Participant::new(id, Role::Employer, label))
            .chain(
                worker_ids
                    .iter()
                    .zip(worker_labels)
                    .map(|(&id, label)| Participant::new(id, Role::Worker, label)),
            )
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            skills: SkillTracker::new(config.max_skill_level())?,
            clock: PeriodClock::new(config.num_periods, config.hiring_steps)?,
            state: MarketState::new(participants)?,
            ledger: OfferLedger::new(),
            outcomes: OutcomeArena::new(),
            phase: SessionPhase::NotStarted,
            matching: None,
            barrier: ActiveBarrier::Idle,
            efforts: BTreeMap::new(),
            rounds: Vec::new(),
            rng,
            events: EventLog::new(),
            config,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    pub fn skills(&self) -> &SkillTracker {
        &self.skills
    }

    pub fn ledger(&self) -> &OfferLedger {
        &self.ledger
    }

    pub fn outcomes(&self) -> &OutcomeArena {
        &self.outcomes
    }

    pub fn clock(&self) -> &PeriodClock {
        &self.clock
    }

    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    /// Summaries of every completed hiring round, in order
    pub fn round_history(&self) -> &[RoundSummary] {
        &self.rounds
    }

    /// Matching engine of the current period's hiring phase
    pub fn matching(&self) -> Option<&MatchingEngine> {
        self.matching.as_ref()
    }

    /// Participants the open barrier is still waiting for
    pub fn pending(&self) -> Vec<ParticipantId> {
        self.barrier.pending()
    }

    // ========================================================================
    // Driving the protocol
    // ========================================================================

    /// Cross every complete barrier
    ///
    /// Starts period 1 on the first call. Barriers nobody has to act at
    /// (e.g. a responses barrier without open offers) are crossed
    /// immediately. Stops at the first barrier with pending participants.
    pub fn advance(&mut self) -> Result<Advance, SimulationError> {
        loop {
            match self.phase {
                SessionPhase::NotStarted => self.begin_period()?,
                SessionPhase::Finished => return Ok(Advance::Finished),
                phase => {
                    let pending = self.barrier.pending();
                    if !pending.is_empty() {
                        return Ok(Advance::Waiting { phase, pending });
                    }
                    self.cross_barrier()?;
                }
            }
        }
    }

    /// Submit an employer's action for the offers barrier
    pub fn submit_offer(
        &mut self,
        employer: ParticipantId,
        action: EmployerAction,
    ) -> Result<(), SimulationError> {
        if !matches!(self.phase, SessionPhase::HiringOffers { .. }) {
            return Err(self.wrong_phase("submit an offer"));
        }
        self.require_role(employer, Role::Employer)?;
        self.expect_submission(employer)?;

        if let EmployerAction::Offer { worker, wage, .. } = action {
            if !self.config.wage_in_bounds(wage) {
                return Err(SimulationError::InvalidAction {
                    participant: employer,
                    reason: format!("wage {} is outside 1..={}", wage, self.config.max_wage),
                });
            }
            let engine = self.matching.as_ref().ok_or_else(missing_engine)?;
            if !engine.eligible_workers(employer, &self.ledger).contains(&worker) {
                return Err(SimulationError::InvalidAction {
                    participant: employer,
                    reason: format!("worker {} is not eligible", worker),
                });
            }
        }

        match &mut self.barrier {
            ActiveBarrier::Offers(barrier) => Ok(barrier.submit(employer, action)?),
            _ => Err(self.wrong_phase("submit an offer")),
        }
    }

    /// Submit a worker's choice for the responses barrier
    pub fn submit_response(
        &mut self,
        worker: ParticipantId,
        choice: WorkerChoice,
    ) -> Result<(), SimulationError> {
        if !matches!(self.phase, SessionPhase::HiringResponses { .. }) {
            return Err(self.wrong_phase("respond to offers"));
        }
        self.require_role(worker, Role::Worker)?;
        self.expect_submission(worker)?;

        if let WorkerChoice::Accept(employer) = choice {
            let period = self.clock.current_period();
            let has_offer = self
                .ledger
                .open_offers_for(period, worker)
                .iter()
                .any(|offer| offer.employer() == employer);
            if !has_offer {
                return Err(SimulationError::InvalidAction {
                    participant: worker,
                    reason: format!("no open offer from employer {}", employer),
                });
            }
        }

        match &mut self.barrier {
            ActiveBarrier::Responses(barrier) => Ok(barrier.submit(worker, choice)?),
            _ => Err(self.wrong_phase("respond to offers")),
        }
    }

    /// Submit a matched worker's effort level
    pub fn submit_effort(&mut self, worker: ParticipantId, effort: u32) -> Result<(), SimulationError> {
        if !matches!(self.phase, SessionPhase::Work { .. }) {
            return Err(self.wrong_phase("choose effort"));
        }
        self.require_role(worker, Role::Worker)?;
        self.expect_submission(worker)?;

        if self.config.effort_cost(effort).is_none() {
            return Err(SimulationError::InvalidAction {
                participant: worker,
                reason: format!("effort {} is outside 1..={}", effort, self.config.max_effort),
            });
        }

        match &mut self.barrier {
            ActiveBarrier::Effort(barrier) => Ok(barrier.submit(worker, effort)?),
            _ => Err(self.wrong_phase("choose effort")),
        }
    }

    /// Acknowledge the period results
    pub fn acknowledge(&mut self, participant: ParticipantId) -> Result<(), SimulationError> {
        if !matches!(self.phase, SessionPhase::Results { .. }) {
            return Err(self.wrong_phase("acknowledge results"));
        }
        if self.state.get(participant).is_none() {
            return Err(SimulationError::UnknownParticipant(participant));
        }

        match &mut self.barrier {
            ActiveBarrier::Results(barrier) => Ok(barrier.submit(participant, ())?),
            _ => Err(self.wrong_phase("acknowledge results")),
        }
    }

    /// Record that a participant missed the deadline of the open barrier
    ///
    /// The stage default is applied when the barrier is crossed.
    pub fn time_out(&mut self, participant: ParticipantId) -> Result<(), SimulationError> {
        if self.phase.stage().is_none() {
            return Err(self.wrong_phase("time out a participant"));
        }
        if self.state.get(participant).is_none() {
            return Err(SimulationError::UnknownParticipant(participant));
        }
        Ok(self.barrier.time_out(participant)?)
    }

    /// Time out everyone the open barrier is still waiting for
    pub fn expire_pending(&mut self) -> Vec<ParticipantId> {
        self.barrier.time_out_pending()
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// The employer's offer form: every worker with eligibility flags
    pub fn employer_options(&self, employer: ParticipantId) -> Result<EmployerOptions, SimulationError> {
        self.require_role(employer, Role::Employer)?;
        let engine = self.matching.as_ref().ok_or_else(|| self.wrong_phase("view offer options"))?;
        let period = engine.period();
        let eligible = engine.eligible_workers(employer, &self.ledger);

        let workers = self
            .state
            .workers()
            .into_iter()
            .filter_map(|worker| self.state.get(worker))
            .map(|participant| {
                let worker = participant.id();
                WorkerView {
                    worker,
                    label: participant.label().to_string(),
                    skill: self.skills.level(worker),
                    matched: participant.is_matched(),
                    rejected_you: self.ledger.is_excluded(period, employer, worker),
                    eligible: eligible.contains(&worker),
                }
            })
            .collect();

        Ok(EmployerOptions {
            period,
            round: engine.round(),
            must_act: matches!(self.barrier, ActiveBarrier::Offers(_))
                && self.barrier.pending().contains(&employer),
            max_wage: self.config.max_wage,
            workers,
        })
    }

    /// The worker's response form: open offers addressed to them
    pub fn worker_options(&self, worker: ParticipantId) -> Result<WorkerOptions, SimulationError> {
        self.require_role(worker, Role::Worker)?;
        let engine = self.matching.as_ref().ok_or_else(|| self.wrong_phase("view offers"))?;
        let period = engine.period();

        Ok(WorkerOptions {
            period,
            round: engine.round(),
            must_act: matches!(self.barrier, ActiveBarrier::Responses(_))
                && self.barrier.pending().contains(&worker),
            skill: self.skills.level(worker),
            offers: self
                .ledger
                .open_offers_for(period, worker)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    /// Projected payoffs at every effort level under the worker's contract
    ///
    /// Empty for a worker without a contract this period.
    pub fn effort_options(&self, worker: ParticipantId) -> Result<Vec<EffortProjection>, SimulationError> {
        self.require_role(worker, Role::Worker)?;
        let period = self.clock.current_period();
        let Some(contract) = self.ledger.contract_for(period, worker)? else {
            return Ok(Vec::new());
        };
        let skill = self
            .skills
            .level(worker)
            .ok_or(SkillError::UnknownWorker(worker))?;

        Ok(PayoffEngine::new(&self.config).effort_schedule(
            contract.wage(),
            skill,
            contract.training(),
        )?)
    }

    /// Offers involving the participant up to the current period, most recent first
    pub fn offer_history(&self, participant: ParticipantId) -> Vec<&Offer> {
        self.ledger
            .history_for(participant, self.clock.current_period())
    }

    pub fn period_outcome(&self, participant: ParticipantId, period: usize) -> Option<&PeriodOutcome> {
        self.outcomes.get(participant, period)
    }

    /// Every participant's outcome for a period, in id order
    pub fn period_results(&self, period: usize) -> Vec<&PeriodOutcome> {
        self.outcomes.for_period(period)
    }

    pub fn payoff_history(&self, participant: ParticipantId) -> Vec<i64> {
        self.outcomes.payoff_history(participant)
    }

    pub fn skill_table(&self) -> Vec<SkillTableRow> {
        PayoffEngine::new(&self.config).skill_table()
    }

    /// Payoff history of the whole group
    pub fn report(&self) -> SessionReport {
        SessionReport {
            periods_completed: self.outcomes.completed_periods(),
            finished: self.phase == SessionPhase::Finished,
            offers_made: self.ledger.len(),
            contracts: self.ledger.offers().iter().filter(|o| o.is_accepted()).count(),
            participants: self
                .state
                .participants()
                .map(|p| ParticipantReport {
                    id: p.id(),
                    role: p.role(),
                    label: p.label().to_string(),
                    payoffs: self.outcomes.payoff_history(p.id()),
                    total_payoff: self.outcomes.total_payoff(p.id()),
                    skill: self.skills.level(p.id()),
                    timeouts: self.events.timeout_count(p.id()),
                })
                .collect(),
        }
    }

    // ========================================================================
    // Checkpointing
    // ========================================================================

    /// Capture the complete session state
    pub fn snapshot(&self) -> Result<SessionSnapshot, SimulationError> {
        Ok(SessionSnapshot {
            config_hash: compute_config_hash(&self.config)?,
            phase: self.phase,
            clock: self.clock.clone(),
            state: self.state.clone(),
            skills: self.skills.clone(),
            offers: self.ledger.offers().to_vec(),
            outcomes: self.outcomes.clone(),
            matching: self.matching.clone(),
            barrier: self.barrier.clone(),
            efforts: self.efforts.clone(),
            rounds: self.rounds.clone(),
            rng_state: self.rng.get_state(),
            events: self.events.clone(),
        })
    }

    /// Resume a session from a snapshot taken with the same configuration
    ///
    /// The ledger is rebuilt offer by offer, so a tampered snapshot that
    /// breaks a ledger invariant is refused.
    pub fn restore(config: MarketConfig, snapshot: SessionSnapshot) -> Result<Self, SimulationError> {
        config.validate()?;
        let actual = compute_config_hash(&config)?;
        if actual != snapshot.config_hash {
            return Err(SimulationError::ConfigMismatch {
                expected: snapshot.config_hash,
                actual,
            });
        }

        let ledger = OfferLedger::from_offers(snapshot.offers)?;
        if !snapshot.state.matches_consistent() {
            return Err(SimulationError::InvariantViolation(
                "snapshot has asymmetric match pointers".to_string(),
            ));
        }

        Ok(Self {
            config,
            state: snapshot.state,
            skills: snapshot.skills,
            ledger,
            outcomes: snapshot.outcomes,
            clock: snapshot.clock,
            phase: snapshot.phase,
            matching: snapshot.matching,
            barrier: snapshot.barrier,
            efforts: snapshot.efforts,
            rounds: snapshot.rounds,
            rng: RngManager::new(snapshot.rng_state),
            events: snapshot.events,
        })
    }

    // ========================================================================
    // Period lifecycle
    // ========================================================================

    fn begin_period(&mut self) -> Result<(), SimulationError> {
        self.clock.start_period();
        let period = self.clock.current_period();
        self.events.log(Event::PeriodStarted { period });

        if period == 1 {
            let workers = self.state.workers();
            for (slot, &worker) in workers.iter().enumerate() {
                let level = *self.config.starting_skills.get(slot).ok_or(
                    ConfigError::StartingSkillsTooShort {
                        len: self.config.starting_skills.len(),
                        num_workers: workers.len(),
                    },
                )?;
                self.skills.assign(worker, level)?;
                self.events.log(Event::SkillAssigned {
                    period,
                    worker,
                    level,
                });
            }
        } else {
            let carried = self
                .skills
                .carry_forward(self.outcomes.for_period(period - 1))?;
            for change in carried {
                self.events.log(Event::SkillIncreased {
                    period,
                    worker: change.worker,
                    from: change.from,
                    to: change.to,
                });
            }
        }

        self.state.reset_for_period();
        self.efforts.clear();
        self.matching = Some(MatchingEngine::new(
            period,
            self.config.hiring_steps,
            &self.state.employers(),
            &self.state.workers(),
        ));
        self.open_offer_round()
    }

    fn open_offer_round(&mut self) -> Result<(), SimulationError> {
        let engine = self.matching.as_mut().ok_or_else(missing_engine)?;
        let barrier = engine.open_offer_barrier(&self.ledger, &mut self.events);
        self.phase = SessionPhase::HiringOffers {
            period: engine.period(),
            round: engine.round(),
        };
        self.barrier = ActiveBarrier::Offers(barrier);
        Ok(())
    }

    fn cross_barrier(&mut self) -> Result<(), SimulationError> {
        match std::mem::replace(&mut self.barrier, ActiveBarrier::Idle) {
            ActiveBarrier::Idle => Err(SimulationError::InvariantViolation(format!(
                "no barrier open during {:?}",
                self.phase
            ))),
            ActiveBarrier::Offers(barrier) => {
                let submissions = barrier.close()?;
                let engine = self.matching.as_mut().ok_or_else(missing_engine)?;
                engine.apply_offers(submissions, &mut self.ledger, &self.config, &mut self.events)?;

                self.phase = SessionPhase::HiringResponses {
                    period: engine.period(),
                    round: engine.round(),
                };
                self.barrier = ActiveBarrier::Responses(engine.open_response_barrier(&self.ledger));
                Ok(())
            }
            ActiveBarrier::Responses(barrier) => {
                let submissions = barrier.close()?;
                let engine = self.matching.as_mut().ok_or_else(missing_engine)?;
                engine.apply_responses(submissions, &mut self.ledger, &mut self.state, &mut self.events)?;
                let summary = engine.finish_round(&self.ledger, &mut self.state, &mut self.events);
                let finished = engine.is_finished();

                self.rounds.push(summary);
                self.clock.advance_round();
                if finished {
                    self.enter_work()
                } else {
                    self.open_offer_round()
                }
            }
            ActiveBarrier::Effort(barrier) => {
                self.collect_efforts(barrier.close()?);
                self.settle()
            }
            ActiveBarrier::Results(barrier) => self.close_period(barrier.close()?),
        }
    }

    /// Check the period's contracts and open the effort barrier
    fn enter_work(&mut self) -> Result<(), SimulationError> {
        let period = self.clock.current_period();
        self.ledger.verify_period(period)?;

        let pairs = self.state.matched_pairs();
        let accepted = self.ledger.accepted_count(period);
        if !self.state.matches_consistent() || pairs != accepted {
            return Err(SimulationError::InvariantViolation(format!(
                "period {}: {} matched pairs but {} accepted offers",
                period, pairs, accepted
            )));
        }

        let (active, skipped): (Vec<ParticipantId>, Vec<ParticipantId>) = self
            .state
            .participants()
            .map(|p| p.id())
            .partition(|&id| {
                self.state
                    .get(id)
                    .is_some_and(|p| p.role().is_worker() && p.is_matched())
            });

        self.barrier = ActiveBarrier::Effort(RoundBarrier::new(BarrierStage::Effort, active, skipped));
        self.phase = SessionPhase::Work { period };
        Ok(())
    }

    fn collect_efforts(&mut self, submissions: BTreeMap<ParticipantId, Submission<u32>>) {
        let period = self.clock.current_period();
        for (worker, submission) in submissions {
            let (effort, defaulted) = match submission {
                Submission::Skipped => continue,
                Submission::Acted(effort) => (effort, false),
                Submission::TimedOut => {
                    self.events.log(Event::ParticipantTimedOut {
                        period,
                        round: None,
                        participant: worker,
                        stage: BarrierStage::Effort,
                        applied: TimeoutDefault::MinimumEffort,
                    });
                    (1, true)
                }
            };
            self.efforts.insert(worker, effort);
            self.events.log(Event::EffortChosen {
                period,
                worker,
                effort,
                defaulted,
            });
        }
    }

    fn settle(&mut self) -> Result<(), SimulationError> {
        let period = self.clock.current_period();
        PayoffEngine::new(&self.config).settle_period(
            period,
            &self.state,
            &self.ledger,
            &self.efforts,
            &mut self.skills,
            &mut self.outcomes,
            &mut self.events,
        )?;

        self.barrier = ActiveBarrier::Results(RoundBarrier::new(
            BarrierStage::Results,
            self.state.ids(),
            Vec::new(),
        ));
        self.phase = SessionPhase::Results { period };
        Ok(())
    }

    fn close_period(&mut self, submissions: BTreeMap<ParticipantId, Submission<()>>) -> Result<(), SimulationError> {
        let period = self.clock.current_period();
        for (participant, submission) in submissions {
            if submission == Submission::TimedOut {
                self.events.log(Event::ParticipantTimedOut {
                    period,
                    round: None,
                    participant,
                    stage: BarrierStage::Results,
                    applied: TimeoutDefault::Acknowledged,
                });
            }
        }
        self.events.log(Event::PeriodClosed { period });

        if self.clock.is_final_period() {
            self.phase = SessionPhase::Finished;
            self.events.log(Event::SessionFinished { period });
            Ok(())
        } else {
            self.begin_period()
        }
    }

    // ========================================================================
    // Boundary checks
    // ========================================================================

    fn wrong_phase(&self, action: &'static str) -> SimulationError {
        SimulationError::WrongPhase {
            action,
            phase: self.phase,
        }
    }

    fn require_role(&self, participant: ParticipantId, role: Role) -> Result<(), SimulationError> {
        match self.state.role_of(participant) {
            None => Err(SimulationError::UnknownParticipant(participant)),
            Some(actual) if actual == role => Ok(()),
            Some(actual) => Err(SimulationError::InvalidAction {
                participant,
                reason: format!("a {} cannot act as a {}", actual, role),
            }),
        }
    }

    fn expect_submission(&self, participant: ParticipantId) -> Result<(), SimulationError> {
        let Some(stage) = self.phase.stage() else {
            return Err(self.wrong_phase("submit an action"));
        };
        if !self.barrier.is_active(participant) {
            return Err(BarrierError::NotExpected { participant, stage }.into());
        }
        if self.barrier.has_submitted(participant) {
            return Err(BarrierError::AlreadySubmitted { participant, stage }.into());
        }
        Ok(())
    }
}

/// Labels for one role: drawn from the pool, or numbered when it is empty
fn draw_labels(
    pool: &[String],
    pool_name: &'static str,
    prefix: &str,
    count: usize,
    rng: &mut RngManager,
) -> Result<Vec<String>, SimulationError> {
    if pool.is_empty() {
        return Ok((1..=count).map(|n| format!("{} {}", prefix, n)).collect());
    }
    rng.sample(pool, count).ok_or_else(|| {
        ConfigError::LabelPoolTooSmall {
            pool: pool_name,
            len: pool.len(),
            needed: count,
        }
        .into()
    })
}
