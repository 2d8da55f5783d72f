//! Labor Market Core - Rust Engine
//!
//! Multi-period labor-market session with deterministic execution:
//! employers and workers negotiate wage/training contracts in
//! barrier-synchronized hiring rounds, workers supply effort, and both
//! sides earn period payoffs that drive worker skill.
//!
//! # Architecture
//!
//! - **core**: Configuration and the period clock
//! - **models**: Domain types (Participant, Offer, ledger, outcomes, events)
//! - **skills**: Worker skill levels and pending increases
//! - **matching**: Round barrier and the hiring-round matching engine
//! - **payoff**: Payoff and revenue computation
//! - **orchestrator**: Period scheduler, session driving, checkpoints
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 points
//! 2. All randomness is deterministic (seeded RNG)
//! 3. A participant holds at most one accepted offer per period
//! 4. FFI boundary is minimal and safe

// Module declarations
pub mod core;
pub mod matching;
pub mod models;
pub mod orchestrator;
pub mod payoff;
pub mod rng;
pub mod skills;

// Re-exports for convenience
pub use crate::core::{ConfigError, MarketConfig, MarketPreset, PeriodClock};
pub use matching::{BarrierStage, EmployerAction, MatchingEngine, MatchingError, RoundBarrier, WorkerChoice};
pub use models::{
    event::{Event, EventLog},
    ledger::{LedgerError, OfferFilter, OfferLedger},
    offer::{Offer, OfferError, OfferId, OfferStatus},
    outcome::{OutcomeArena, PeriodOutcome},
    participant::{Participant, ParticipantError, ParticipantId, Role},
    state::MarketState,
};
pub use orchestrator::{Advance, Session, SessionPhase, SessionReport, SimulationError};
pub use payoff::{PayoffEngine, PayoffError, RevenueBreakdown};
pub use rng::RngManager;
pub use skills::{SkillError, SkillTracker};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn labor_market_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::session::PySession>()?;
    Ok(())
}
