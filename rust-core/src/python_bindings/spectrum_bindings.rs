//! Python bindings for spectrum analysis

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use super::to_py_err;
use crate::spectrum::{AnalyzerConfig, SpectrumAnalyzer, WindowType};

/// Window type enum exposed to Python
#[pyclass(name = "WindowType")]
#[derive(Clone)]
pub enum PyWindowType {
    Hann,
    Hamming,
    Rectangular,
}

impl From<PyWindowType> for WindowType {
    fn from(py_win: PyWindowType) -> Self {
        match py_win {
            PyWindowType::Hann => WindowType::Hann,
            PyWindowType::Hamming => WindowType::Hamming,
            PyWindowType::Rectangular => WindowType::Rectangular,
        }
    }
}

/// Spectrum analyzer exposed to Python
#[pyclass(name = "SpectrumAnalyzer")]
pub struct PySpectrumAnalyzer {
    analyzer: SpectrumAnalyzer,
}

#[pymethods]
impl PySpectrumAnalyzer {
    /// Create a new spectrum analyzer
    ///
    /// Args:
    ///     fft_size: Transform size N; frames are zero-padded or truncated to N
    ///     window_type: Window type for analysis
    ///     sample_rate: Sample rate in Hz
    #[new]
    #[pyo3(signature = (fft_size=1024, window_type=PyWindowType::Hann, sample_rate=48000.0))]
    fn new(fft_size: usize, window_type: PyWindowType, sample_rate: f64) -> PyResult<Self> {
        let config = AnalyzerConfig {
            fft_size,
            window_type: window_type.into(),
            sample_rate,
        };

        Ok(Self {
            analyzer: SpectrumAnalyzer::new(config).map_err(to_py_err)?,
        })
    }

    /// Analyze a frame and return N/2 magnitude bins
    fn analyze<'py>(&mut self, py: Python<'py>, frame: PyReadonlyArray1<f64>) -> PyResult<&'py PyArray1<f64>> {
        let frame = frame.as_slice().map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(PyArray1::from_vec(py, self.analyzer.analyze(frame)))
    }

    /// Analyze a frame and return magnitudes in dB
    ///
    /// Args:
    ///     frame: Input frame as numpy array
    ///     reference: Reference level for dB calculation (default: 1.0)
    #[pyo3(signature = (frame, reference=1.0))]
    fn analyze_db<'py>(
        &mut self,
        py: Python<'py>,
        frame: PyReadonlyArray1<f64>,
        reference: f64,
    ) -> PyResult<&'py PyArray1<f64>> {
        let frame = frame.as_slice().map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(PyArray1::from_vec(py, self.analyzer.analyze_db(frame, reference)))
    }

    /// Get frequency bins in Hz
    fn frequency_bins_hz<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        PyArray1::from_vec(py, self.analyzer.frequency_bins_hz())
    }

    /// Index of the strongest bin
    #[staticmethod]
    fn peak_bin(spectrum: PyReadonlyArray1<f64>) -> PyResult<Option<usize>> {
        let spectrum = spectrum.as_slice().map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(SpectrumAnalyzer::peak_bin(spectrum))
    }

    /// Get number of frequency bins
    fn num_bins(&self) -> usize {
        self.analyzer.num_bins()
    }

    /// Get current FFT size
    fn get_fft_size(&self) -> usize {
        self.analyzer.config().fft_size
    }
}
