//! Domain models for the labor market

pub mod event;
pub mod ledger;
pub mod offer;
pub mod outcome;
pub mod participant;
pub mod state;

// Re-exports
pub use event::{Event, EventLog, RejectionReason, TimeoutDefault};
pub use ledger::{LedgerError, OfferFilter, OfferLedger};
pub use offer::{Offer, OfferError, OfferId, OfferStatus};
pub use outcome::{OutcomeArena, OutcomeError, PeriodOutcome};
pub use participant::{EmployerState, Participant, ParticipantError, ParticipantId, Role, WorkerState};
pub use state::MarketState;
