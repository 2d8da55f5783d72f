//! Driving a session from an action source
//!
//! [`Session::run`] plays a whole session by asking an [`ActionSource`] for
//! every pending participant's action at every barrier. A source answers
//! `None` to signal a timeout, so the same loop covers human hosts,
//! recorded scripts and random agents.
//!
//! Scripts are plain JSON lists of [`ScriptEntry`]:
//!
//! ```json
//! [
//!   {"period": 1, "round": 1, "participant": 1,
//!    "action": {"kind": "offer", "worker": 4, "wage": 300, "training": false}},
//!   {"period": 1, "round": 1, "participant": 4,
//!    "action": {"kind": "accept", "employer": 1}},
//!   {"period": 1, "participant": 4, "action": {"kind": "effort", "level": 5}}
//! ]
//! ```
//!
//! Anything the script does not mention times out.

use crate::matching::{BarrierStage, EmployerAction, WorkerChoice};
use crate::models::participant::ParticipantId;
use crate::orchestrator::engine::{Advance, Session, SessionPhase, SessionReport, SimulationError};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A participant's action at any barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Offer {
        worker: ParticipantId,
        wage: i64,
        training: bool,
    },
    Withdraw,
    Accept {
        employer: ParticipantId,
    },
    RejectAll,
    Effort {
        level: u32,
    },
    Acknowledge,
}

impl Action {
    /// Barrier this action belongs to
    pub fn stage(&self) -> BarrierStage {
        match self {
            Action::Offer { .. } | Action::Withdraw => BarrierStage::Offers,
            Action::Accept { .. } | Action::RejectAll => BarrierStage::Responses,
            Action::Effort { .. } => BarrierStage::Effort,
            Action::Acknowledge => BarrierStage::Results,
        }
    }
}

impl From<EmployerAction> for Action {
    fn from(action: EmployerAction) -> Self {
        match action {
            EmployerAction::Offer {
                worker,
                wage,
                training,
            } => Action::Offer {
                worker,
                wage,
                training,
            },
            EmployerAction::Withdraw => Action::Withdraw,
        }
    }
}

impl From<WorkerChoice> for Action {
    fn from(choice: WorkerChoice) -> Self {
        match choice {
            WorkerChoice::Accept(employer) => Action::Accept { employer },
            WorkerChoice::RejectAll => Action::RejectAll,
        }
    }
}

/// What the session asks one participant for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub period: usize,
    /// Hiring round (offers and responses only)
    pub round: Option<usize>,
    pub stage: BarrierStage,
    pub participant: ParticipantId,
    /// Offers: eligible workers. Responses: employers with open offers.
    pub choices: Vec<ParticipantId>,
    pub max_wage: i64,
    pub max_effort: u32,
}

/// Supplies actions at barriers; `None` means the participant timed out
pub trait ActionSource {
    fn next_action(&mut self, request: &ActionRequest) -> Option<Action>;
}

/// One recorded action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub period: usize,
    #[serde(default)]
    pub round: Option<usize>,
    pub participant: ParticipantId,
    pub action: Action,
}

type ScriptKey = (usize, Option<usize>, BarrierStage, ParticipantId);

/// Replays recorded actions; everything unrecorded times out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedActions {
    actions: BTreeMap<ScriptKey, Action>,
}

impl ScriptedActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ScriptEntry>) -> Self {
        let mut script = Self::new();
        for entry in entries {
            script.push(entry);
        }
        script
    }

    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        let entries: Vec<ScriptEntry> = serde_json::from_str(json).map_err(|e| {
            SimulationError::SerializationError(format!("Script deserialization failed: {}", e))
        })?;
        Ok(Self::from_entries(entries))
    }

    /// Record an action; a later entry for the same slot replaces the earlier
    pub fn push(&mut self, entry: ScriptEntry) {
        let round = match entry.action.stage() {
            BarrierStage::Offers | BarrierStage::Responses => entry.round,
            BarrierStage::Effort | BarrierStage::Results => None,
        };
        self.actions.insert(
            (entry.period, round, entry.action.stage(), entry.participant),
            entry.action,
        );
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Entries in (period, round, stage, participant) order
    pub fn entries(&self) -> Vec<ScriptEntry> {
        self.actions
            .iter()
            .map(|(&(period, round, _, participant), &action)| ScriptEntry {
                period,
                round,
                participant,
                action,
            })
            .collect()
    }
}

impl ActionSource for ScriptedActions {
    fn next_action(&mut self, request: &ActionRequest) -> Option<Action> {
        self.actions
            .get(&(request.period, request.round, request.stage, request.participant))
            .copied()
    }
}

/// Seeded random agent, for stress runs and property tests
///
/// Times out with probability `timeout_rate`; otherwise picks uniformly
/// among the available choices.
#[derive(Debug, Clone)]
pub struct RandomActions {
    rng: RngManager,
    timeout_rate: f64,
}

impl RandomActions {
    pub fn new(seed: u64, timeout_rate: f64) -> Self {
        Self {
            rng: RngManager::new(seed),
            timeout_rate,
        }
    }
}

impl ActionSource for RandomActions {
    fn next_action(&mut self, request: &ActionRequest) -> Option<Action> {
        if self.rng.next_f64() < self.timeout_rate {
            return None;
        }
        let action = match request.stage {
            BarrierStage::Offers => {
                if request.choices.is_empty() || self.rng.next_f64() < 0.25 {
                    Action::Withdraw
                } else {
                    Action::Offer {
                        worker: request.choices[self.rng.index(request.choices.len())],
                        wage: self.rng.range(1, request.max_wage.saturating_add(1)),
                        training: self.rng.next_f64() < 0.5,
                    }
                }
            }
            BarrierStage::Responses => {
                let pick = self.rng.index(request.choices.len() + 1);
                match request.choices.get(pick) {
                    Some(&employer) => Action::Accept { employer },
                    None => Action::RejectAll,
                }
            }
            BarrierStage::Effort => Action::Effort {
                level: self.rng.range(1, request.max_effort as i64 + 1) as u32,
            },
            BarrierStage::Results => Action::Acknowledge,
        };
        Some(action)
    }
}

/// Wraps a source and records every action it hands out
///
/// The recording replays the exact same session through
/// [`ScriptedActions`].
#[derive(Debug, Clone)]
pub struct Recorder<S> {
    inner: S,
    script: ScriptedActions,
}

impl<S: ActionSource> Recorder<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            script: ScriptedActions::new(),
        }
    }

    pub fn into_script(self) -> ScriptedActions {
        self.script
    }
}

impl<S: ActionSource> ActionSource for Recorder<S> {
    fn next_action(&mut self, request: &ActionRequest) -> Option<Action> {
        let action = self.inner.next_action(request)?;
        self.script.push(ScriptEntry {
            period: request.period,
            round: request.round,
            participant: request.participant,
            action,
        });
        Some(action)
    }
}

impl Session {
    /// Submit any action; it must match the open barrier
    pub fn submit(&mut self, participant: ParticipantId, action: Action) -> Result<(), SimulationError> {
        match action {
            Action::Offer {
                worker,
                wage,
                training,
            } => self.submit_offer(
                participant,
                EmployerAction::Offer {
                    worker,
                    wage,
                    training,
                },
            ),
            Action::Withdraw => self.submit_offer(participant, EmployerAction::Withdraw),
            Action::Accept { employer } => {
                self.submit_response(participant, WorkerChoice::Accept(employer))
            }
            Action::RejectAll => self.submit_response(participant, WorkerChoice::RejectAll),
            Action::Effort { level } => self.submit_effort(participant, level),
            Action::Acknowledge => self.acknowledge(participant),
        }
    }

    /// Build the request a pending participant is asked to answer
    pub fn request_for(&self, participant: ParticipantId) -> Result<ActionRequest, SimulationError> {
        let phase = self.phase();
        let (Some(period), Some(stage)) = (phase.period(), phase.stage()) else {
            return Err(SimulationError::WrongPhase {
                action: "request an action",
                phase,
            });
        };

        let choices = match phase {
            SessionPhase::HiringOffers { .. } => self
                .employer_options(participant)?
                .workers
                .into_iter()
                .filter(|w| w.eligible)
                .map(|w| w.worker)
                .collect(),
            SessionPhase::HiringResponses { .. } => self
                .worker_options(participant)?
                .offers
                .iter()
                .map(|o| o.employer())
                .collect(),
            _ => Vec::new(),
        };

        Ok(ActionRequest {
            period,
            round: phase.round(),
            stage,
            participant,
            choices,
            max_wage: self.config().max_wage,
            max_effort: self.config().max_effort,
        })
    }

    /// Play the session to the end
    ///
    /// Every pending participant is asked in id order; `None` from the
    /// source times them out. An action the session rejects aborts the
    /// run with that error.
    pub fn run(&mut self, source: &mut dyn ActionSource) -> Result<SessionReport, SimulationError> {
        while let Advance::Waiting { pending, .. } = self.advance()? {
            for participant in pending {
                let request = self.request_for(participant)?;
                match source.next_action(&request) {
                    Some(action) => self.submit(participant, action)?,
                    None => self.time_out(participant)?,
                }
            }
        }
        Ok(self.report())
    }
}
