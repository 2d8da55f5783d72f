//! Hiring protocol
//!
//! Barrier primitive, participant actions and the round-by-round matching
//! engine for one period.

pub mod actions;
pub mod barrier;
pub mod engine;

pub use actions::{EmployerAction, WorkerChoice};
pub use barrier::{BarrierError, BarrierStage, RoundBarrier, Submission};
pub use engine::{MatchingEngine, MatchingError, RoundSummary};
