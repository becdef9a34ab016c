//! Spectral analysis with FFT

pub mod fft;
pub mod windowing;
pub mod analysis;

pub use fft::FftEngine;
pub use windowing::{generate_window, WindowType};
pub use analysis::{AnalyzerConfig, SpectrumAnalyzer};
