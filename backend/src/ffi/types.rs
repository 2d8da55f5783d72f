//! Type conversion utilities for FFI boundary
//!
//! Values cross the boundary as JSON: Python dicts are dumped with the
//! standard `json` module and deserialized with serde, results go the
//! other way. This keeps the Rust types the single source of truth for
//! field names.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::orchestrator::SimulationError;

/// Deserialize a Python dict into a Rust value via JSON
pub fn from_py_dict<T: DeserializeOwned>(dict: &Bound<'_, PyDict>) -> PyResult<T> {
    let json = PyModule::import_bound(dict.py(), "json")?;
    let text: String = json.call_method1("dumps", (dict,))?.extract()?;
    serde_json::from_str(&text)
        .map_err(|e| PyErr::new::<PyValueError, _>(format!("Invalid value: {}", e)))
}

/// Serialize a Rust value into native Python objects via JSON
pub fn to_py_object<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let text = serde_json::to_string(value)
        .map_err(|e| PyErr::new::<PyRuntimeError, _>(format!("Serialization failed: {}", e)))?;
    let json = PyModule::import_bound(py, "json")?;
    Ok(json.call_method1("loads", (text,))?.unbind())
}

/// Map a session error onto a Python exception
///
/// Boundary rejections become `ValueError` (the caller may submit a
/// different action); fatal faults become `RuntimeError`.
pub fn to_py_err(error: SimulationError) -> PyErr {
    if error.is_fatal() {
        PyErr::new::<PyRuntimeError, _>(error.to_string())
    } else {
        PyErr::new::<PyValueError, _>(error.to_string())
    }
}
