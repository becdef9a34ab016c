//! FFT engine using rustfft
//!
//! Complex forward transform over a real frame (imaginary part zero) with
//! reusable buffers, so repeated analysis does not reallocate.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Fixed-size forward FFT engine
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    fft: Arc<dyn Fft<f64>>,

    /// Reusable complex work buffer
    buffer: Vec<Complex<f64>>,

    /// Reusable scratch space for in-place processing
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples, any size > 0)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    /// Transform a real signal and write the first N/2 magnitudes
    ///
    /// # Arguments
    /// * `signal` - Input signal; zero-padded when shorter than the FFT size,
    ///   truncated when longer
    /// * `magnitude` - Output, resized to fft_size / 2
    pub fn compute_magnitude_into(&mut self, signal: &[f64], magnitude: &mut Vec<f64>) {
        let copy_len = signal.len().min(self.fft_size);

        for (slot, &s) in self.buffer[..copy_len].iter_mut().zip(signal.iter()) {
            *slot = Complex::new(s, 0.0);
        }
        self.buffer[copy_len..].fill(Complex::new(0.0, 0.0));

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        magnitude.clear();
        magnitude.extend(self.buffer[..self.num_bins()].iter().map(|c| c.norm()));
    }

    /// Compute FFT and return magnitude spectrum
    ///
    /// # Returns
    /// Magnitude |X[k]| for k = 0..fft_size/2 (Nyquist bin excluded)
    pub fn compute_magnitude(&mut self, signal: &[f64]) -> Vec<f64> {
        let mut magnitude = Vec::with_capacity(self.num_bins());
        self.compute_magnitude_into(signal, &mut magnitude);
        magnitude
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced per transform
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2
    }
}
