//! Python bindings for the biquad filter and the three-band equalizer

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::sync::Arc;

use super::to_py_err;
use crate::filters::{Band, BiquadFilter, BiquadType, EqConfig, EqGains, EqualizerBank};

/// Biquad response type exposed to Python
#[pyclass(name = "BiquadType")]
#[derive(Clone)]
pub enum PyBiquadType {
    Lowpass,
    Bandpass,
    Highpass,
}

impl From<PyBiquadType> for BiquadType {
    fn from(py_type: PyBiquadType) -> Self {
        match py_type {
            PyBiquadType::Lowpass => BiquadType::Lowpass,
            PyBiquadType::Bandpass => BiquadType::Bandpass,
            PyBiquadType::Highpass => BiquadType::Highpass,
        }
    }
}

/// Single biquad filter exposed to Python
#[pyclass(name = "BiquadFilter")]
pub struct PyBiquadFilter {
    filter: BiquadFilter,
}

#[pymethods]
impl PyBiquadFilter {
    /// Create a new biquad filter
    ///
    /// Args:
    ///     sample_rate: Sample rate in Hz
    ///     frequency: Cutoff or center frequency in Hz
    ///     q: Quality factor
    ///     filter_type: Response type
    #[new]
    #[pyo3(signature = (sample_rate, frequency, q=0.707, filter_type=PyBiquadType::Lowpass))]
    fn new(sample_rate: f64, frequency: f64, q: f64, filter_type: PyBiquadType) -> PyResult<Self> {
        let filter = BiquadFilter::new(sample_rate, frequency, q, filter_type.into()).map_err(to_py_err)?;
        Ok(Self { filter })
    }

    /// Filter a block of samples
    ///
    /// Args:
    ///     signal: Input signal as numpy array
    ///
    /// Returns:
    ///     Filtered signal as numpy array
    fn process<'py>(&mut self, py: Python<'py>, signal: PyReadonlyArray1<f64>) -> PyResult<&'py PyArray1<f64>> {
        let mut block = signal
            .as_slice()
            .map_err(|e| PyValueError::new_err(e.to_string()))?
            .to_vec();
        self.filter.process_block_inplace(&mut block);
        Ok(PyArray1::from_vec(py, block))
    }

    /// Reset filter state
    fn reset(&mut self) {
        self.filter.reset();
    }

    /// Magnitude response at a frequency in Hz
    fn magnitude_at(&self, frequency: f64) -> f64 {
        self.filter.magnitude_at(frequency)
    }
}

/// Three-band equalizer exposed to Python
#[pyclass(name = "Equalizer")]
pub struct PyEqualizer {
    bank: EqualizerBank,
    gains: Arc<EqGains>,
}

#[pymethods]
impl PyEqualizer {
    /// Create an equalizer with the default 200 / 1000 / 3000 Hz split
    #[new]
    #[pyo3(signature = (sample_rate=48000.0))]
    fn new(sample_rate: f64) -> PyResult<Self> {
        let gains = Arc::new(EqGains::default());
        let bank = EqualizerBank::new(sample_rate, &EqConfig::default(), Arc::clone(&gains)).map_err(to_py_err)?;
        Ok(Self { bank, gains })
    }

    /// Equalize a frame of normalized samples
    fn process<'py>(&mut self, py: Python<'py>, frame: PyReadonlyArray1<f64>) -> PyResult<&'py PyArray1<f64>> {
        let frame = frame.as_slice().map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(PyArray1::from_vec(py, self.bank.process_frame(frame)))
    }

    fn set_bass_gain(&self, gain: f64) -> PyResult<()> {
        self.gains.set(Band::Bass, gain).map_err(to_py_err)
    }

    fn set_mid_gain(&self, gain: f64) -> PyResult<()> {
        self.gains.set(Band::Mid, gain).map_err(to_py_err)
    }

    fn set_treble_gain(&self, gain: f64) -> PyResult<()> {
        self.gains.set(Band::Treble, gain).map_err(to_py_err)
    }

    /// Current (bass, mid, treble) gains
    fn gains(&self) -> (f64, f64, f64) {
        self.gains.snapshot()
    }

    /// Reset filter state
    fn reset(&mut self) {
        self.bank.reset();
    }
}
