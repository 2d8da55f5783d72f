//! Orchestrator - period scheduler and session driving
//!
//! See `engine.rs` for the session lifecycle, `driver.rs` for running a
//! session from an action source and `checkpoint.rs` for save/restore.

pub mod checkpoint;
pub mod driver;
pub mod engine;

// Re-export main types for convenience
pub use engine::{
    ActiveBarrier, Advance, EmployerOptions, ParticipantReport, Session, SessionPhase, SessionReport,
    SimulationError, WorkerOptions, WorkerView,
};

pub use checkpoint::{compute_config_hash, SessionSnapshot};
pub use driver::{
    Action, ActionRequest, ActionSource, RandomActions, Recorder, ScriptEntry, ScriptedActions,
};
