//! High-level spectrum analyzer
//!
//! Combines the FFT engine with a window for per-frame magnitude spectra

use super::fft::FftEngine;
use super::windowing::{apply_window_inplace, generate_window, WindowType};
use crate::error::{AudioError, Result};

/// Spectrum analyzer configuration
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Transform size N; frames are zero-padded or truncated to N
    pub fft_size: usize,

    /// Window type for spectral analysis
    pub window_type: WindowType,

    /// Sample rate in Hz (only used for the frequency axis)
    pub sample_rate: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            window_type: WindowType::Hann,
            sample_rate: 48000.0,
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 2 {
            return Err(AudioError::config(format!(
                "FFT size must be at least 2, got {}",
                self.fft_size
            )));
        }
        if !(self.sample_rate > 0.0) {
            return Err(AudioError::config("analyzer sample rate must be positive"));
        }
        Ok(())
    }
}

/// Real-time spectrum analyzer
///
/// Stateless across calls apart from its scratch buffers.
pub struct SpectrumAnalyzer {
    config: AnalyzerConfig,
    fft_engine: FftEngine,
    window: Vec<f64>,
    frame_buffer: Vec<f64>,
}

impl SpectrumAnalyzer {
    /// Create new spectrum analyzer
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;

        let fft_engine = FftEngine::new(config.fft_size);
        let window = generate_window(config.window_type, config.fft_size);
        let frame_buffer = vec![0.0; config.fft_size];

        Ok(Self {
            config,
            fft_engine,
            window,
            frame_buffer,
        })
    }

    /// Analyze a frame and return its magnitude spectrum
    ///
    /// # Arguments
    /// * `frame` - Normalized samples; shorter frames are zero-padded to N,
    ///   longer frames truncated to N
    ///
    /// # Returns
    /// N/2 magnitude bins, ascending from DC
    pub fn analyze(&mut self, frame: &[f64]) -> Vec<f64> {
        let mut spectrum = Vec::with_capacity(self.num_bins());
        self.analyze_into(frame, &mut spectrum);
        spectrum
    }

    /// Same as [`analyze`](Self::analyze), writing into a caller-owned buffer
    pub fn analyze_into(&mut self, frame: &[f64], spectrum: &mut Vec<f64>) {
        let n = self.config.fft_size;
        let copy_len = frame.len().min(n);

        // Pad first, then window the whole N-point block
        self.frame_buffer[..copy_len].copy_from_slice(&frame[..copy_len]);
        self.frame_buffer[copy_len..].fill(0.0);
        apply_window_inplace(&mut self.frame_buffer, &self.window);

        self.fft_engine.compute_magnitude_into(&self.frame_buffer, spectrum);
    }

    /// Analyze and return magnitude in dB
    ///
    /// # Arguments
    /// * `frame` - Input frame
    /// * `reference` - Reference level for 0 dB
    pub fn analyze_db(&mut self, frame: &[f64], reference: f64) -> Vec<f64> {
        self.analyze(frame)
            .iter()
            .map(|&mag| {
                let mag_clamped = mag.max(1e-10);
                20.0 * (mag_clamped / reference).log10()
            })
            .collect()
    }

    /// Center frequency of each bin in Hz
    pub fn frequency_bins_hz(&self) -> Vec<f64> {
        let n = self.config.fft_size as f64;
        (0..self.num_bins())
            .map(|bin| bin as f64 * self.config.sample_rate / n)
            .collect()
    }

    /// Bin index closest to the given frequency
    pub fn bin_for_frequency(&self, frequency: f64) -> usize {
        (frequency * self.config.fft_size as f64 / self.config.sample_rate).round() as usize
    }

    /// Index of the largest magnitude, or None for an empty spectrum
    pub fn peak_bin(spectrum: &[f64]) -> Option<usize> {
        spectrum
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &m)| match best {
                Some((_, best_mag)) if best_mag >= m => best,
                _ => Some((i, m)),
            })
            .map(|(i, _)| i)
    }

    /// Get current configuration
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Number of magnitude bins (N/2)
    pub fn num_bins(&self) -> usize {
        self.fft_engine.num_bins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| (2.0 * PI * freq * n as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_sine_peak_bin() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();

        for freq in [440.0, 1000.0, 5000.0, 12345.0] {
            let spectrum = analyzer.analyze(&sine(freq, 48000.0, 1024));
            assert_eq!(spectrum.len(), 512);

            let peak = SpectrumAnalyzer::peak_bin(&spectrum).unwrap() as i64;
            let expected = analyzer.bin_for_frequency(freq) as i64;
            assert!((peak - expected).abs() <= 1, "{freq} Hz: peak {peak}, expected {expected}");
        }
    }

    #[test]
    fn test_silence_gives_zero_spectrum() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let spectrum = analyzer.analyze(&vec![0.0; 1024]);
        assert_eq!(spectrum.len(), 512);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_short_frame_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();

        // 20 ms frame at 48 kHz is shorter than N
        let spectrum = analyzer.analyze(&sine(3000.0, 48000.0, 960));
        assert_eq!(spectrum.len(), 512);

        let peak = SpectrumAnalyzer::peak_bin(&spectrum).unwrap() as i64;
        assert!((peak - 64).abs() <= 1);
    }

    #[test]
    fn test_long_frame_truncated() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let mut frame = vec![0.0; 2048];
        frame[1500] = 1.0;
        assert!(analyzer.analyze(&frame).iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_frequency_axis() {
        let analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let freqs = analyzer.frequency_bins_hz();
        assert_eq!(freqs.len(), 512);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[1] - 46.875).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_db_floor() {
        let mut analyzer = SpectrumAnalyzer::new(AnalyzerConfig::default()).unwrap();
        let db = analyzer.analyze_db(&[0.0; 16], 1.0);
        assert!(db.iter().all(|&d| (d + 200.0).abs() < 1e-9));
    }

    #[test]
    fn test_rejects_tiny_fft() {
        let config = AnalyzerConfig { fft_size: 1, ..AnalyzerConfig::default() };
        assert!(SpectrumAnalyzer::new(config).is_err());
    }

    #[test]
    fn test_peak_bin_empty() {
        assert_eq!(SpectrumAnalyzer::peak_bin(&[]), None);
        assert_eq!(SpectrumAnalyzer::peak_bin(&[0.0, 3.0, 1.0]), Some(1));
    }
}
