//! Automatic level control driven by frame RMS
//!
//! Once per completed frame the normalizer measures RMS energy, derives the
//! scale that would bring the frame to the target level, clamps it, and
//! smooths it with a one-pole IIR. The resulting scale is applied to
//! subsequent output samples, so loudness adapts with one frame of lag.

use crate::error::{AudioError, Result};
use crate::sample::{self, I16_FULL_SCALE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decay of the scale smoother: scale = DECAY * previous + (1 - DECAY) * raw
pub const SMOOTHING_DECAY: f64 = 0.9;

/// RMS values at or below this count as silence
pub const SILENCE_EPSILON: f64 = 1e-9;

/// Normalizer parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainConfig {
    /// Target RMS, normalized to full scale
    pub target_rms: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for GainConfig {
    fn default() -> Self {
        Self {
            target_rms: 0.25,
            min_scale: 0.1,
            max_scale: 4.0,
        }
    }
}

impl GainConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.target_rms > 0.0) {
            return Err(AudioError::config("target RMS must be positive"));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale) {
            return Err(AudioError::config(format!(
                "scale bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.min_scale, self.max_scale
            )));
        }
        if !self.max_scale.is_finite() {
            return Err(AudioError::config("max scale must be finite"));
        }
        Ok(())
    }
}

/// Published copy of the smoothed scale, readable from any thread
#[derive(Debug)]
pub struct SharedScale(AtomicU64);

impl SharedScale {
    pub fn new(scale: f64) -> Self {
        Self(AtomicU64::new(scale.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn store(&self, scale: f64) {
        self.0.store(scale.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedScale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// RMS-driven gain normalizer
///
/// The smoothed scale (GainState) is owned by the processing thread; other
/// threads observe it through the [`SharedScale`] handle.
pub struct GainNormalizer {
    config: GainConfig,
    scale: f64,
    published: Arc<SharedScale>,
}

impl GainNormalizer {
    /// Create a normalizer starting at unity scale
    pub fn new(config: GainConfig) -> Result<Self> {
        Self::with_shared_scale(config, Arc::new(SharedScale::default()))
    }

    /// Create a normalizer publishing into an existing handle
    ///
    /// The handle is left untouched until the first frame, so building a
    /// chain never disturbs a value another worker still publishes.
    pub fn with_shared_scale(config: GainConfig, published: Arc<SharedScale>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            scale: 1.0,
            published,
        })
    }

    /// Unsmoothed, clamped scale for a frame
    pub fn raw_scale(&self, frame: &[i16]) -> f64 {
        let rms_normalized = sample::rms(frame) / I16_FULL_SCALE;

        let raw = if rms_normalized > SILENCE_EPSILON {
            self.config.target_rms / rms_normalized
        } else {
            self.config.max_scale
        };

        raw.clamp(self.config.min_scale, self.config.max_scale)
    }

    /// Fold one completed frame into the smoothed scale and return it
    pub fn update_and_get_scale(&mut self, frame: &[i16]) -> f64 {
        let raw = self.raw_scale(frame);
        self.scale = SMOOTHING_DECAY * self.scale + (1.0 - SMOOTHING_DECAY) * raw;
        self.published.store(self.scale);
        self.scale
    }

    /// Multiply samples by the current scale with hard clipping to 16-bit range
    pub fn apply(&self, samples: &mut [i16]) {
        apply_scale(samples, self.scale);
    }

    pub fn current_scale(&self) -> f64 {
        self.scale
    }

    pub fn shared_scale(&self) -> &Arc<SharedScale> {
        &self.published
    }

    pub fn config(&self) -> &GainConfig {
        &self.config
    }

    /// Return to unity scale
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.published.store(1.0);
    }
}

/// Multiply samples by `scale`, hard clipping to [-32768, 32767]
pub fn apply_scale(samples: &mut [i16], scale: f64) {
    for s in samples.iter_mut() {
        *s = sample::clip_to_i16(*s as f64 * scale);
    }
}
