//! PyO3 wrapper for Session
//!
//! This module provides the Python interface to the session engine, for a
//! hosting framework that renders the forms and collects submissions.

use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::types::{from_py_dict, to_py_err, to_py_object};
use crate::core::config::MarketConfig;
use crate::matching::{EmployerAction, WorkerChoice};
use crate::models::participant::ParticipantId;
use crate::orchestrator::{Advance, Session as RustSession, SessionSnapshot};

/// Python wrapper for a Rust Session
///
/// # Example (from Python)
///
/// ```python
/// from labor_market_core import Session
///
/// session = Session({"num_periods": 5, "num_employers": 3, "num_workers": 3})
/// state = session.advance()
/// for employer in state["Waiting"]["pending"]:
///     session.submit_offer(employer, {"kind": "withdraw"})
/// ```
#[pyclass(name = "Session")]
pub struct PySession {
    inner: RustSession,
}

#[pymethods]
impl PySession {
    /// Create a session; missing config fields take their defaults
    #[new]
    fn new(config: &Bound<'_, PyDict>) -> PyResult<Self> {
        let config: MarketConfig = from_py_dict(config)?;
        let inner = RustSession::new(config).map_err(to_py_err)?;
        Ok(PySession { inner })
    }

    /// Cross every complete barrier; returns the pending barrier or "Finished"
    fn advance(&mut self, py: Python<'_>) -> PyResult<PyObject> {
        let advance: Advance = self.inner.advance().map_err(to_py_err)?;
        to_py_object(py, &advance)
    }

    fn phase(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py_object(py, &self.inner.phase())
    }

    fn pending(&self) -> Vec<ParticipantId> {
        self.inner.pending()
    }

    /// Submit `{"kind": "offer", "worker": id, "wage": w, "training": b}`
    /// or `{"kind": "withdraw"}`
    fn submit_offer(&mut self, employer: ParticipantId, action: &Bound<'_, PyDict>) -> PyResult<()> {
        let action: EmployerAction = from_py_dict(action)?;
        self.inner.submit_offer(employer, action).map_err(to_py_err)
    }

    /// Accept the offer from `choice`, or reject all with 0
    fn submit_response(&mut self, worker: ParticipantId, choice: ParticipantId) -> PyResult<()> {
        self.inner
            .submit_response(worker, WorkerChoice::from_choice_id(choice))
            .map_err(to_py_err)
    }

    fn submit_effort(&mut self, worker: ParticipantId, effort: u32) -> PyResult<()> {
        self.inner.submit_effort(worker, effort).map_err(to_py_err)
    }

    fn acknowledge(&mut self, participant: ParticipantId) -> PyResult<()> {
        self.inner.acknowledge(participant).map_err(to_py_err)
    }

    fn time_out(&mut self, participant: ParticipantId) -> PyResult<()> {
        self.inner.time_out(participant).map_err(to_py_err)
    }

    fn expire_pending(&mut self) -> Vec<ParticipantId> {
        self.inner.expire_pending()
    }

    fn employer_options(&self, py: Python<'_>, employer: ParticipantId) -> PyResult<PyObject> {
        let options = self.inner.employer_options(employer).map_err(to_py_err)?;
        to_py_object(py, &options)
    }

    fn worker_options(&self, py: Python<'_>, worker: ParticipantId) -> PyResult<PyObject> {
        let options = self.inner.worker_options(worker).map_err(to_py_err)?;
        to_py_object(py, &options)
    }

    fn effort_options(&self, py: Python<'_>, worker: ParticipantId) -> PyResult<PyObject> {
        let options = self.inner.effort_options(worker).map_err(to_py_err)?;
        to_py_object(py, &options)
    }

    fn offer_history(&self, py: Python<'_>, participant: ParticipantId) -> PyResult<PyObject> {
        to_py_object(py, &self.inner.offer_history(participant))
    }

    fn period_results(&self, py: Python<'_>, period: usize) -> PyResult<PyObject> {
        to_py_object(py, &self.inner.period_results(period))
    }

    fn skill_table(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py_object(py, &self.inner.skill_table())
    }

    fn payoff_history(&self, participant: ParticipantId) -> Vec<i64> {
        self.inner.payoff_history(participant)
    }

    fn report(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py_object(py, &self.inner.report())
    }

    /// Serialize the full session state to a JSON string
    fn save_state(&self) -> PyResult<String> {
        self.inner
            .snapshot()
            .and_then(|snapshot| snapshot.to_json())
            .map_err(to_py_err)
    }

    /// Resume a session from `save_state` output and its original config
    #[staticmethod]
    fn load_state(config: &Bound<'_, PyDict>, state_json: &str) -> PyResult<Self> {
        let config: MarketConfig = from_py_dict(config)?;
        let snapshot = SessionSnapshot::from_json(state_json).map_err(to_py_err)?;
        let inner = RustSession::restore(config, snapshot).map_err(to_py_err)?;
        Ok(PySession { inner })
    }
}
