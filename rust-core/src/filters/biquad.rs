//! Second-order IIR (biquad) filter
//!
//! Coefficients follow the RBJ audio EQ cookbook; processing uses the
//! transposed direct form II with two delay registers.

use crate::error::{AudioError, Result};
use crate::sample;
use std::f64::consts::PI;

/// Biquad response type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadType {
    Lowpass,
    Bandpass,
    Highpass,
}

/// Raw cookbook coefficients (not yet normalized by a0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Compute cookbook coefficients
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `frequency` - Cutoff (or center) frequency in Hz, 0 < f < sample_rate/2
    /// * `q` - Quality factor, > 0
    /// * `filter_type` - Response type
    pub fn compute(sample_rate: f64, frequency: f64, q: f64, filter_type: BiquadType) -> Result<Self> {
        validate(sample_rate, frequency, q)?;

        let omega = 2.0 * PI * frequency / sample_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_w = omega.cos();

        let coeffs = match filter_type {
            BiquadType::Lowpass => Self {
                b0: (1.0 - cos_w) / 2.0,
                b1: 1.0 - cos_w,
                b2: (1.0 - cos_w) / 2.0,
                a0: 1.0 + alpha,
                a1: -2.0 * cos_w,
                a2: 1.0 - alpha,
            },
            BiquadType::Bandpass => Self {
                b0: alpha,
                b1: 0.0,
                b2: -alpha,
                a0: 1.0 + alpha,
                a1: -2.0 * cos_w,
                a2: 1.0 - alpha,
            },
            BiquadType::Highpass => Self {
                b0: (1.0 + cos_w) / 2.0,
                b1: -(1.0 + cos_w),
                b2: (1.0 + cos_w) / 2.0,
                a0: 1.0 + alpha,
                a1: -2.0 * cos_w,
                a2: 1.0 - alpha,
            },
        };

        Ok(coeffs)
    }
}

fn validate(sample_rate: f64, frequency: f64, q: f64) -> Result<()> {
    if !(sample_rate > 0.0) {
        return Err(AudioError::config(format!("sample rate must be positive, got {sample_rate}")));
    }
    if !(q > 0.0) {
        return Err(AudioError::config(format!("Q must be positive, got {q}")));
    }
    if !(frequency > 0.0 && frequency < sample_rate / 2.0) {
        return Err(AudioError::config(format!(
            "frequency {frequency} Hz must lie in (0, {}) Hz",
            sample_rate / 2.0
        )));
    }
    Ok(())
}

/// Single biquad filter instance with its own delay state
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: BiquadType,
    sample_rate: f64,
    frequency: f64,
    q: f64,

    coefficients: BiquadCoefficients,

    // Delay registers, owned by this instance only
    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    /// Create a new biquad filter
    ///
    /// Fails with a configuration error when q <= 0, f <= 0 or f >= sample_rate/2.
    pub fn new(sample_rate: f64, frequency: f64, q: f64, filter_type: BiquadType) -> Result<Self> {
        let coefficients = BiquadCoefficients::compute(sample_rate, frequency, q, filter_type)?;

        Ok(Self {
            filter_type,
            sample_rate,
            frequency,
            q,
            coefficients,
            z1: 0.0,
            z2: 0.0,
        })
    }

    /// Recompute coefficients; delay state is cleared since the old state
    /// belongs to a different filter
    pub fn set_coefficients(
        &mut self,
        sample_rate: f64,
        frequency: f64,
        q: f64,
        filter_type: BiquadType,
    ) -> Result<()> {
        self.coefficients = BiquadCoefficients::compute(sample_rate, frequency, q, filter_type)?;
        self.sample_rate = sample_rate;
        self.frequency = frequency;
        self.q = q;
        self.filter_type = filter_type;
        self.reset();
        Ok(())
    }

    /// Reinitialize for a new sample rate, keeping frequency, Q and type
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        self.set_coefficients(sample_rate, self.frequency, self.q, self.filter_type)
    }

    /// Process a single sample
    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let c = &self.coefficients;
        let out = (c.b0 / c.a0) * x + self.z1;
        self.z1 = (c.b1 / c.a0) * x - (c.a1 / c.a0) * out + self.z2;
        self.z2 = (c.b2 / c.a0) * x - (c.a2 / c.a0) * out;
        out
    }

    /// Process a 16-bit sample through the normalized float domain
    #[inline]
    pub fn process_i16(&mut self, x: i16) -> i16 {
        sample::to_int(self.process(sample::to_float(x)))
    }

    /// Process a block in-place
    pub fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Clear delay state without touching coefficients
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    pub fn filter_type(&self) -> BiquadType {
        self.filter_type
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Magnitude response at a given frequency in Hz
    pub fn magnitude_at(&self, frequency: f64) -> f64 {
        let c = &self.coefficients;
        let w = 2.0 * PI * frequency / self.sample_rate;
        let (cos1, sin1) = (w.cos(), w.sin());
        let (cos2, sin2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = c.b0 + c.b1 * cos1 + c.b2 * cos2;
        let num_im = -(c.b1 * sin1 + c.b2 * sin2);
        let den_re = c.a0 + c.a1 * cos1 + c.a2 * cos2;
        let den_im = -(c.a1 * sin1 + c.a2 * sin2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| (2.0 * PI * freq * n as f64 / sample_rate).sin())
            .collect()
    }

    fn steady_state_peak(filter: &mut BiquadFilter, signal: &[f64]) -> f64 {
        let out: Vec<f64> = signal.iter().map(|&x| filter.process(x)).collect();
        out[out.len() / 2..].iter().fold(0.0f64, |m, &y| m.max(y.abs()))
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(BiquadFilter::new(48000.0, 1000.0, 0.0, BiquadType::Lowpass).is_err());
        assert!(BiquadFilter::new(48000.0, 1000.0, -1.0, BiquadType::Lowpass).is_err());
        assert!(BiquadFilter::new(48000.0, 0.0, 0.707, BiquadType::Highpass).is_err());
        assert!(BiquadFilter::new(48000.0, 24000.0, 0.707, BiquadType::Bandpass).is_err());
        assert!(BiquadFilter::new(48000.0, 30000.0, 0.707, BiquadType::Bandpass).is_err());
        assert!(BiquadFilter::new(48000.0, 23999.0, 0.707, BiquadType::Bandpass).is_ok());
    }

    #[test]
    fn test_silence_after_reset() {
        let mut filter = BiquadFilter::new(48000.0, 1000.0, 0.707, BiquadType::Bandpass).unwrap();

        // Excite the filter so the delay registers are non-zero
        for x in sine(1000.0, 48000.0, 256) {
            filter.process(x);
        }
        filter.reset();

        for _ in 0..512 {
            assert_eq!(filter.process(0.0), 0.0);
        }
    }

    #[test]
    fn test_coefficients_are_deterministic() {
        for filter_type in [BiquadType::Lowpass, BiquadType::Bandpass, BiquadType::Highpass] {
            let a = BiquadCoefficients::compute(44100.0, 3000.0, 0.707, filter_type).unwrap();
            let b = BiquadCoefficients::compute(44100.0, 3000.0, 0.707, filter_type).unwrap();
            assert_eq!(a.b0.to_bits(), b.b0.to_bits());
            assert_eq!(a.b1.to_bits(), b.b1.to_bits());
            assert_eq!(a.b2.to_bits(), b.b2.to_bits());
            assert_eq!(a.a0.to_bits(), b.a0.to_bits());
            assert_eq!(a.a1.to_bits(), b.a1.to_bits());
            assert_eq!(a.a2.to_bits(), b.a2.to_bits());
        }
    }

    #[test]
    fn test_set_coefficients_is_idempotent() {
        let mut filter = BiquadFilter::new(48000.0, 200.0, 0.707, BiquadType::Lowpass).unwrap();
        let before = *filter.coefficients();
        filter.set_coefficients(48000.0, 200.0, 0.707, BiquadType::Lowpass).unwrap();
        filter.set_coefficients(48000.0, 200.0, 0.707, BiquadType::Lowpass).unwrap();
        assert_eq!(before, *filter.coefficients());
    }

    #[test]
    fn test_lowpass_passes_dc_and_blocks_high() {
        let mut lp = BiquadFilter::new(48000.0, 200.0, 0.707, BiquadType::Lowpass).unwrap();

        // DC converges to unity gain
        let mut y = 0.0;
        for _ in 0..48000 {
            y = lp.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-6);

        lp.reset();
        let peak = steady_state_peak(&mut lp, &sine(8000.0, 48000.0, 4800));
        assert!(peak < 0.01, "8 kHz leaked through 200 Hz lowpass: {peak}");
    }

    #[test]
    fn test_highpass_blocks_low() {
        let mut hp = BiquadFilter::new(48000.0, 3000.0, 0.707, BiquadType::Highpass).unwrap();
        let low = steady_state_peak(&mut hp, &sine(50.0, 48000.0, 9600));
        hp.reset();
        let high = steady_state_peak(&mut hp, &sine(10000.0, 48000.0, 4800));
        assert!(low < 0.01);
        assert!(high > 0.9);
    }

    #[test]
    fn test_bandpass_unity_at_center() {
        let bp = BiquadFilter::new(48000.0, 1000.0, 0.707, BiquadType::Bandpass).unwrap();
        assert!((bp.magnitude_at(1000.0) - 1.0).abs() < 1e-9);
        assert!(bp.magnitude_at(20.0) < 0.1);
    }

    #[test]
    fn test_sample_rate_change_resets_state() {
        let mut filter = BiquadFilter::new(48000.0, 1000.0, 0.707, BiquadType::Lowpass).unwrap();
        filter.process(1.0);
        filter.set_sample_rate(44100.0).unwrap();
        assert_eq!(filter.sample_rate(), 44100.0);
        assert_eq!(filter.process(0.0), 0.0);
    }

    #[test]
    fn test_i16_io() {
        let mut filter = BiquadFilter::new(48000.0, 1000.0, 0.707, BiquadType::Lowpass).unwrap();
        assert_eq!(filter.process_i16(0), 0);
    }
}
