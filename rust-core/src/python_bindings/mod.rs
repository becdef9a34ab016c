//! PyO3 bindings for Python integration

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::error::AudioError;

mod filter_bindings;
mod pipeline_bindings;
mod spectrum_bindings;

/// Map core errors onto Python exceptions
pub(crate) fn to_py_err(err: AudioError) -> PyErr {
    match err {
        AudioError::Configuration(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Python module definition
#[pymodule]
fn signal_lab(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<filter_bindings::PyBiquadType>()?;
    m.add_class::<filter_bindings::PyBiquadFilter>()?;
    m.add_class::<filter_bindings::PyEqualizer>()?;
    m.add_class::<spectrum_bindings::PyWindowType>()?;
    m.add_class::<spectrum_bindings::PySpectrumAnalyzer>()?;
    m.add_class::<pipeline_bindings::PyAudioPipeline>()?;

    Ok(())
}
