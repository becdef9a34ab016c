//! Three-band equalizer built from parallel biquads
//!
//! Bass (lowpass), mid (bandpass) and treble (highpass) filters all see the
//! same input sample; their outputs are weighted by independent user gains
//! and summed.

use super::biquad::{BiquadFilter, BiquadType};
use crate::error::{AudioError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tuning of one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandConfig {
    /// Cutoff (bass/treble) or center (mid) frequency in Hz
    pub frequency: f64,
    pub q: f64,
}

/// Crossover tuning for the three bands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqConfig {
    pub bass: BandConfig,
    pub mid: BandConfig,
    pub treble: BandConfig,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            bass: BandConfig { frequency: 200.0, q: 0.707 },
            mid: BandConfig { frequency: 1000.0, q: 0.707 },
            treble: BandConfig { frequency: 3000.0, q: 0.707 },
        }
    }
}

impl EqConfig {
    /// Validate every band against the given sample rate
    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        self.build_filters(sample_rate).map(|_| ())
    }

    fn build_filters(&self, sample_rate: f64) -> Result<[BiquadFilter; 3]> {
        Ok([
            BiquadFilter::new(sample_rate, self.bass.frequency, self.bass.q, BiquadType::Lowpass)?,
            BiquadFilter::new(sample_rate, self.mid.frequency, self.mid.q, BiquadType::Bandpass)?,
            BiquadFilter::new(sample_rate, self.treble.frequency, self.treble.q, BiquadType::Highpass)?,
        ])
    }
}

/// Identifies one of the three bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Bass,
    Mid,
    Treble,
}

/// User gains shared between the control thread and the processing thread
///
/// Each gain is an independent atomic word. A store becomes visible to the
/// processing thread at some later sample boundary; there is no commit point
/// across the three values.
#[derive(Debug)]
pub struct EqGains {
    bass: AtomicU64,
    mid: AtomicU64,
    treble: AtomicU64,
}

impl Default for EqGains {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl EqGains {
    pub fn new(bass: f64, mid: f64, treble: f64) -> Self {
        Self {
            bass: AtomicU64::new(bass.max(0.0).to_bits()),
            mid: AtomicU64::new(mid.max(0.0).to_bits()),
            treble: AtomicU64::new(treble.max(0.0).to_bits()),
        }
    }

    fn slot(&self, band: Band) -> &AtomicU64 {
        match band {
            Band::Bass => &self.bass,
            Band::Mid => &self.mid,
            Band::Treble => &self.treble,
        }
    }

    /// Set a band gain. Negative or non-finite gains are rejected.
    pub fn set(&self, band: Band, gain: f64) -> Result<()> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(AudioError::config(format!(
                "{band:?} gain must be a non-negative finite number, got {gain}"
            )));
        }
        self.slot(band).store(gain.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn get(&self, band: Band) -> f64 {
        f64::from_bits(self.slot(band).load(Ordering::Relaxed))
    }

    /// Snapshot of (bass, mid, treble)
    pub fn snapshot(&self) -> (f64, f64, f64) {
        (self.get(Band::Bass), self.get(Band::Mid), self.get(Band::Treble))
    }
}

/// Three-band equalizer for a single (mono) sample stream
pub struct EqualizerBank {
    bass: BiquadFilter,
    mid: BiquadFilter,
    treble: BiquadFilter,
    gains: Arc<EqGains>,
}

impl EqualizerBank {
    /// Create an equalizer bank
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `config` - Band tuning
    /// * `gains` - Shared gain handle, usually owned by the pipeline
    pub fn new(sample_rate: f64, config: &EqConfig, gains: Arc<EqGains>) -> Result<Self> {
        let [bass, mid, treble] = config.build_filters(sample_rate)?;
        Ok(Self { bass, mid, treble, gains })
    }

    /// Equalize one sample
    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let (gain_bass, gain_mid, gain_treble) = self.gains.snapshot();
        self.bass.process(x) * gain_bass + self.mid.process(x) * gain_mid + self.treble.process(x) * gain_treble
    }

    /// Equalize a frame, producing an output frame of identical length
    pub fn process_frame(&mut self, frame: &[f64]) -> Vec<f64> {
        frame.iter().map(|&x| self.process_sample(x)).collect()
    }

    /// Equalize a frame in-place
    pub fn process_frame_inplace(&mut self, frame: &mut [f64]) {
        for sample in frame.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Clear the delay state of all three filters
    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
    }

    /// Retune for a new sample rate (clears filter state)
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        self.bass.set_sample_rate(sample_rate)?;
        self.mid.set_sample_rate(sample_rate)?;
        self.treble.set_sample_rate(sample_rate)?;
        Ok(())
    }

    pub fn gains(&self) -> &Arc<EqGains> {
        &self.gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn bank(bass: f64, mid: f64, treble: f64) -> EqualizerBank {
        let gains = Arc::new(EqGains::new(bass, mid, treble));
        EqualizerBank::new(48000.0, &EqConfig::default(), gains).unwrap()
    }

    fn tone_peak(eq: &mut EqualizerBank, freq: f64) -> f64 {
        let signal: Vec<f64> = (0..9600)
            .map(|n| (2.0 * PI * freq * n as f64 / 48000.0).sin())
            .collect();
        let out = eq.process_frame(&signal);
        out[4800..].iter().fold(0.0f64, |m, &y| m.max(y.abs()))
    }

    #[test]
    fn test_output_length_matches_input() {
        let mut eq = bank(1.0, 1.0, 1.0);
        let frame = vec![0.1; 960];
        assert_eq!(eq.process_frame(&frame).len(), 960);
    }

    #[test]
    fn test_sum_matches_individual_filters() {
        let config = EqConfig::default();
        let mut eq = bank(0.5, 2.0, 1.5);
        let mut lp = BiquadFilter::new(48000.0, 200.0, 0.707, BiquadType::Lowpass).unwrap();
        let mut bp = BiquadFilter::new(48000.0, 1000.0, 0.707, BiquadType::Bandpass).unwrap();
        let mut hp = BiquadFilter::new(48000.0, 3000.0, 0.707, BiquadType::Highpass).unwrap();
        assert_eq!(config.mid.frequency, 1000.0);

        for n in 0..256 {
            let x = ((n * 37) % 101) as f64 / 101.0 - 0.5;
            let expected = lp.process(x) * 0.5 + bp.process(x) * 2.0 + hp.process(x) * 1.5;
            assert!((eq.process_sample(x) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_gains_silence_output() {
        let mut eq = bank(0.0, 0.0, 0.0);
        let out = eq.process_frame(&[0.5, -0.5, 0.25, 1.0]);
        assert!(out.iter().all(|&y| y == 0.0));
    }

    #[test]
    fn test_bass_gain_only_affects_low_band() {
        let mut flat = bank(1.0, 0.0, 0.0);
        let mut boosted = bank(2.0, 0.0, 0.0);

        let low_flat = tone_peak(&mut flat, 50.0);
        let low_boost = tone_peak(&mut boosted, 50.0);
        assert!((low_boost / low_flat - 2.0).abs() < 1e-6);

        flat.reset();
        let high = tone_peak(&mut flat, 12000.0);
        assert!(high < 0.01);
    }

    #[test]
    fn test_gain_update_applies_to_next_sample() {
        let mut eq = bank(1.0, 1.0, 1.0);
        let gains = Arc::clone(eq.gains());
        eq.process_sample(0.3);

        gains.set(Band::Bass, 0.0).unwrap();
        gains.set(Band::Mid, 0.0).unwrap();
        gains.set(Band::Treble, 0.0).unwrap();
        assert_eq!(eq.process_sample(0.3), 0.0);
    }

    #[test]
    fn test_rejects_negative_gain() {
        let gains = EqGains::default();
        assert!(gains.set(Band::Mid, -0.5).is_err());
        assert!(gains.set(Band::Mid, f64::NAN).is_err());
        assert_eq!(gains.get(Band::Mid), 1.0);
    }

    #[test]
    fn test_concurrent_gain_updates() {
        let mut eq = bank(1.0, 1.0, 1.0);
        let gains = Arc::clone(eq.gains());

        let writer = std::thread::spawn(move || {
            for i in 0..10_000 {
                let g = (i % 5) as f64 * 0.5;
                gains.set(Band::Treble, g).unwrap();
                gains.set(Band::Bass, 2.0 - g * 0.5).unwrap();
            }
        });

        for n in 0..20_000 {
            let y = eq.process_sample((n as f64 * 0.01).sin());
            assert!(y.is_finite());
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_invalid_band_rejected() {
        let config = EqConfig {
            treble: BandConfig { frequency: 30000.0, q: 0.707 },
            ..EqConfig::default()
        };
        let result = EqualizerBank::new(48000.0, &config, Arc::new(EqGains::default()));
        assert!(matches!(result, Err(AudioError::Configuration(_))));
    }
}
