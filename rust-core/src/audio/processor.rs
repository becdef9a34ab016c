//! Per-frame processing chain: equalizer then level normalization
//!
//! Runs in the integer I/O domain at its edges and in f64 inside the
//! filters. Each interleaved channel owns its own equalizer bank so filter
//! state never leaks between channels.

use crate::audio::gain::{apply_scale, GainConfig, GainNormalizer, SharedScale};
use crate::config::PipelineConfig;
use crate::error::{AudioError, Result};
use crate::filters::equalizer::{EqConfig, EqGains, EqualizerBank};
use crate::sample;
use std::sync::Arc;

/// Equalizer bank per channel followed by the gain normalizer
pub struct SignalChain {
    channels: usize,
    banks: Vec<EqualizerBank>,
    normalizer: GainNormalizer,
    scratch: Vec<f64>,
}

impl SignalChain {
    /// Build a chain from pipeline configuration
    ///
    /// # Arguments
    /// * `config` - Pipeline configuration (rate, channels, EQ and gain settings)
    /// * `gains` - Shared EQ gains, written by control threads
    /// * `scale` - Handle the smoothed scale is published to
    pub fn new(config: &PipelineConfig, gains: Arc<EqGains>, scale: Arc<SharedScale>) -> Result<Self> {
        Self::with_parts(
            config.sample_rate as f64,
            config.channels,
            &config.eq,
            config.gain,
            gains,
            scale,
        )
    }

    /// Build a chain from individual settings
    pub fn with_parts(
        sample_rate: f64,
        channels: u16,
        eq: &EqConfig,
        gain: GainConfig,
        gains: Arc<EqGains>,
        scale: Arc<SharedScale>,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(AudioError::config("channel count must be positive"));
        }

        let banks = (0..channels)
            .map(|_| EqualizerBank::new(sample_rate, eq, Arc::clone(&gains)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            channels: channels as usize,
            banks,
            normalizer: GainNormalizer::with_shared_scale(gain, scale)?,
            scratch: Vec::new(),
        })
    }

    /// Process one frame, returning a new frame of the same length
    pub fn process(&mut self, frame: &[i16]) -> Vec<i16> {
        let mut out = frame.to_vec();
        self.process_inplace(&mut out);
        out
    }

    /// Process one frame in-place
    ///
    /// The scale applied is the one derived from earlier frames; this frame's
    /// equalized RMS then updates it for the next one.
    pub fn process_inplace(&mut self, frame: &mut [i16]) {
        for (ch, bank) in self.banks.iter_mut().enumerate() {
            self.scratch.clear();
            self.scratch
                .extend(frame.iter().skip(ch).step_by(self.channels).map(|&s| sample::to_float(s)));

            bank.process_frame_inplace(&mut self.scratch);

            for (out, &y) in frame.iter_mut().skip(ch).step_by(self.channels).zip(self.scratch.iter()) {
                *out = sample::to_int(y);
            }
        }

        let scale = self.normalizer.current_scale();
        self.normalizer.update_and_get_scale(frame);
        apply_scale(frame, scale);
    }

    /// Clear filter state and return the normalizer to unity
    pub fn reset(&mut self) {
        for bank in self.banks.iter_mut() {
            bank.reset();
        }
        self.normalizer.reset();
    }

    pub fn current_scale(&self) -> f64 {
        self.normalizer.current_scale()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn chain(channels: u16) -> SignalChain {
        SignalChain::with_parts(
            48000.0,
            channels,
            &EqConfig::default(),
            GainConfig::default(),
            Arc::new(EqGains::default()),
            Arc::new(SharedScale::default()),
        )
        .unwrap()
    }

    fn stereo_sine(freq: f64, amplitude: f64, frames: usize, offset: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = (offset + i) as f64 / 48000.0;
            let s = (amplitude * (2.0 * PI * freq * t).sin()) as i16;
            out.push(s);
            out.push(s);
        }
        out
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut chain = chain(2);
        for _ in 0..5 {
            let out = chain.process(&[0i16; 1920]);
            assert!(out.iter().all(|&s| s == 0));
        }
    }

    #[test]
    fn test_output_length_matches_input() {
        let mut chain = chain(2);
        let out = chain.process(&stereo_sine(440.0, 8000.0, 960, 0));
        assert_eq!(out.len(), 1920);
    }

    #[test]
    fn test_silent_eq_output_raises_scale() {
        let scale = Arc::new(SharedScale::default());
        let mut chain = SignalChain::with_parts(
            48000.0,
            1,
            &EqConfig::default(),
            GainConfig::default(),
            Arc::new(EqGains::new(0.0, 0.0, 0.0)),
            Arc::clone(&scale),
        )
        .unwrap();

        // All gains zero: the EQ output is silent, so the scale moves toward max
        let out = chain.process(&[1000i16; 960]);
        assert!(out.iter().all(|&s| s == 0));
        assert!((scale.load() - (0.9 + 0.1 * 4.0)).abs() < 1e-12);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut chain = chain(2);
        // Left carries a tone, right is silent
        let mut frame = vec![0i16; 1920];
        for i in 0..960 {
            frame[i * 2] = (8000.0 * (2.0 * PI * 440.0 * i as f64 / 48000.0).sin()) as i16;
        }
        let out = chain.process(&frame);
        assert!(out.iter().skip(1).step_by(2).all(|&s| s == 0));
        assert!(out.iter().step_by(2).any(|&s| s != 0));
    }

    #[test]
    fn test_scale_is_published() {
        let mut chain = chain(2);
        let mut offset = 0;
        for _ in 0..50 {
            chain.process(&stereo_sine(1000.0, 4000.0, 960, offset));
            offset += 960;
        }
        assert!(chain.current_scale() > 1.0);
        assert!(chain.current_scale() <= 4.0);
    }

    #[test]
    fn test_zero_channels_rejected() {
        let result = SignalChain::with_parts(
            48000.0,
            0,
            &EqConfig::default(),
            GainConfig::default(),
            Arc::new(EqGains::default()),
            Arc::new(SharedScale::default()),
        );
        assert!(matches!(result, Err(AudioError::Configuration(_))));
    }
}
