//! Python bindings (feature `pyo3`)

pub mod session;
pub mod types;
