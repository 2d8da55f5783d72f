//! Event logging for session replay and auditing.
//!
//! This module defines the Event enum which captures every protocol
//! transition during a session. Events enable:
//! - Auditing (verify the matching protocol step by step)
//! - Debugging (see which defaults were applied on timeouts)
//! - Analysis (extract offers, matches and payoffs per period)
//!
//! # Event Types
//!
//! Events are grouped by session phase:
//! - **Period**: start and close of a period, skill changes
//! - **Hiring**: round openings, offers, withdrawals, acceptances, rejections
//! - **Work**: effort choices
//! - **Results**: payoffs
//! - **Barrier**: timeouts and the default action applied
//!
//! # Example
//!
//! ```rust
//! use labor_market_core::models::Event;
//! use labor_market_core::OfferId;
//!
//! let event = Event::OfferMade {
//!     period: 1,
//!     round: 2,
//!     offer_id: OfferId(0),
//!     employer: 1,
//!     worker: 4,
//!     wage: 300,
//!     training: false,
//! };
//!
//! assert_eq!(event.period(), 1);
//! assert_eq!(event.event_type(), "OfferMade");
//! assert!(event.involves(4));
//! ```

use crate::matching::barrier::BarrierStage;
use crate::models::offer::OfferId;
use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};

/// Why an offer was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// The worker rejected all offers
    Declined,
    /// The worker timed out and all their offers were rejected by default
    TimedOut,
    /// The worker accepted a different offer in the same round
    Superseded,
}

/// Default action applied to a participant who timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutDefault {
    NoOffer,
    RejectAll,
    MinimumEffort,
    Acknowledged,
}

/// Session event capturing a state change.
///
/// Every event carries the period it belongs to. Events are logged in the
/// order they occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    PeriodStarted {
        period: usize,
    },

    /// A worker's starting level was assigned (period 1 only)
    SkillAssigned {
        period: usize,
        worker: ParticipantId,
        level: u32,
    },

    /// A pending training increase was applied at a period boundary
    SkillIncreased {
        period: usize,
        worker: ParticipantId,
        from: u32,
        to: u32,
    },

    /// A hiring round opened; `active_employers` are asked for an action
    HiringRoundOpened {
        period: usize,
        round: usize,
        active_employers: Vec<ParticipantId>,
    },

    OfferMade {
        period: usize,
        round: usize,
        offer_id: OfferId,
        employer: ParticipantId,
        worker: ParticipantId,
        wage: i64,
        training: bool,
    },

    /// Employer chose to make no further offers this period
    OffersWithdrawn {
        period: usize,
        round: usize,
        employer: ParticipantId,
    },

    /// Employer has no eligible workers left (or hiring ran out of rounds)
    EmployerExhausted {
        period: usize,
        round: usize,
        employer: ParticipantId,
    },

    OfferAccepted {
        period: usize,
        round: usize,
        offer_id: OfferId,
        employer: ParticipantId,
        worker: ParticipantId,
    },

    OfferRejected {
        period: usize,
        round: usize,
        offer_id: OfferId,
        employer: ParticipantId,
        worker: ParticipantId,
        reason: RejectionReason,
    },

    /// A participant missed a barrier and received the default action
    ParticipantTimedOut {
        period: usize,
        round: Option<usize>,
        participant: ParticipantId,
        stage: BarrierStage,
        applied: TimeoutDefault,
    },

    HiringClosed {
        period: usize,
        rounds_used: usize,
        matched_pairs: usize,
    },

    EffortChosen {
        period: usize,
        worker: ParticipantId,
        effort: u32,
        defaulted: bool,
    },

    PayoffComputed {
        period: usize,
        participant: ParticipantId,
        payoff: i64,
    },

    PeriodClosed {
        period: usize,
    },

    SessionFinished {
        period: usize,
    },
}

impl Event {
    /// Get the period this event belongs to
    pub fn period(&self) -> usize {
        match self {
            Event::PeriodStarted { period }
            | Event::SkillAssigned { period, .. }
            | Event::SkillIncreased { period, .. }
            | Event::HiringRoundOpened { period, .. }
            | Event::OfferMade { period, .. }
            | Event::OffersWithdrawn { period, .. }
            | Event::EmployerExhausted { period, .. }
            | Event::OfferAccepted { period, .. }
            | Event::OfferRejected { period, .. }
            | Event::ParticipantTimedOut { period, .. }
            | Event::HiringClosed { period, .. }
            | Event::EffortChosen { period, .. }
            | Event::PayoffComputed { period, .. }
            | Event::PeriodClosed { period }
            | Event::SessionFinished { period } => *period,
        }
    }

    /// Get the hiring round, for hiring-phase events
    pub fn round(&self) -> Option<usize> {
        match self {
            Event::HiringRoundOpened { round, .. }
            | Event::OfferMade { round, .. }
            | Event::OffersWithdrawn { round, .. }
            | Event::EmployerExhausted { round, .. }
            | Event::OfferAccepted { round, .. }
            | Event::OfferRejected { round, .. } => Some(*round),
            Event::ParticipantTimedOut { round, .. } => *round,
            _ => None,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::PeriodStarted { .. } => "PeriodStarted",
            Event::SkillAssigned { .. } => "SkillAssigned",
            Event::SkillIncreased { .. } => "SkillIncreased",
            Event::HiringRoundOpened { .. } => "HiringRoundOpened",
            Event::OfferMade { .. } => "OfferMade",
            Event::OffersWithdrawn { .. } => "OffersWithdrawn",
            Event::EmployerExhausted { .. } => "EmployerExhausted",
            Event::OfferAccepted { .. } => "OfferAccepted",
            Event::OfferRejected { .. } => "OfferRejected",
            Event::ParticipantTimedOut { .. } => "ParticipantTimedOut",
            Event::HiringClosed { .. } => "HiringClosed",
            Event::EffortChosen { .. } => "EffortChosen",
            Event::PayoffComputed { .. } => "PayoffComputed",
            Event::PeriodClosed { .. } => "PeriodClosed",
            Event::SessionFinished { .. } => "SessionFinished",
        }
    }

    /// Get the offer id if the event relates to a specific offer
    pub fn offer_id(&self) -> Option<OfferId> {
        match self {
            Event::OfferMade { offer_id, .. }
            | Event::OfferAccepted { offer_id, .. }
            | Event::OfferRejected { offer_id, .. } => Some(*offer_id),
            _ => None,
        }
    }

    /// Whether the event concerns the given participant
    pub fn involves(&self, participant: ParticipantId) -> bool {
        match self {
            Event::SkillAssigned { worker, .. }
            | Event::SkillIncreased { worker, .. }
            | Event::EffortChosen { worker, .. } => *worker == participant,
            Event::OffersWithdrawn { employer, .. } | Event::EmployerExhausted { employer, .. } => {
                *employer == participant
            }
            Event::OfferMade {
                employer, worker, ..
            }
            | Event::OfferAccepted {
                employer, worker, ..
            }
            | Event::OfferRejected {
                employer, worker, ..
            } => *employer == participant || *worker == participant,
            Event::ParticipantTimedOut {
                participant: p, ..
            }
            | Event::PayoffComputed {
                participant: p, ..
            } => *p == participant,
            Event::HiringRoundOpened {
                active_employers, ..
            } => active_employers.contains(&participant),
            Event::PeriodStarted { .. }
            | Event::HiringClosed { .. }
            | Event::PeriodClosed { .. }
            | Event::SessionFinished { .. } => false,
        }
    }
}

/// Event log for storing and querying session events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events for a specific period
    pub fn events_in_period(&self, period: usize) -> Vec<&Event> {
        self.events.iter().filter(|e| e.period() == period).collect()
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events concerning a specific participant
    pub fn events_for_participant(&self, participant: ParticipantId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.involves(participant))
            .collect()
    }

    /// Number of timeouts recorded for a participant
    pub fn timeout_count(&self, participant: ParticipantId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::ParticipantTimedOut { participant: p, .. } if *p == participant))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(period: usize) -> Event {
        Event::OfferRejected {
            period,
            round: 1,
            offer_id: OfferId(3),
            employer: 1,
            worker: 5,
            reason: RejectionReason::Declined,
        }
    }

    #[test]
    fn test_event_round() {
        assert_eq!(rejected(2).round(), Some(1));
        assert_eq!(Event::PeriodStarted { period: 2 }.round(), None);
    }

    #[test]
    fn test_event_offer_id() {
        assert_eq!(rejected(1).offer_id(), Some(OfferId(3)));
        assert_eq!(Event::PeriodClosed { period: 1 }.offer_id(), None);
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.log(Event::PeriodStarted { period: 1 });
        log.log(rejected(1));
        log.log(Event::PeriodStarted { period: 2 });
        log.log(Event::ParticipantTimedOut {
            period: 2,
            round: Some(1),
            participant: 5,
            stage: BarrierStage::Responses,
            applied: TimeoutDefault::RejectAll,
        });

        assert_eq!(log.len(), 4);
        assert_eq!(log.events_in_period(1).len(), 2);
        assert_eq!(log.events_of_type("PeriodStarted").len(), 2);
        assert_eq!(log.events_for_participant(5).len(), 2);
        assert_eq!(log.events_for_participant(1).len(), 1);
        assert_eq!(log.timeout_count(5), 1);
        assert_eq!(log.timeout_count(1), 0);
    }
}
