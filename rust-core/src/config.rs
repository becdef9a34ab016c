//! Pipeline configuration
//!
//! All parameters are construction-time values with sensible defaults
//! (48 kHz interleaved stereo, 20 ms frames, 1024-point spectrum).

use std::time::Duration;

use crate::audio::gain::GainConfig;
use crate::error::{AudioError, Result};
use crate::filters::equalizer::EqConfig;
use crate::spectrum::analysis::AnalyzerConfig;

pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
pub const DEFAULT_CHANNELS: u16 = 2;

/// 48000 / 50 = 960 samples per channel (20 ms)
pub const DEFAULT_FRAME_SAMPLES_PER_CHANNEL: usize = DEFAULT_SAMPLE_RATE as usize / 50;

pub const DEFAULT_PLAYBACK_CHUNK_LEN: usize = 1024;
pub const DEFAULT_MAX_RECORDING: Duration = Duration::from_secs(60);

/// Top-level pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sample rate in Hz, shared by capture, output and analysis
    pub sample_rate: u32,

    /// Interleaved channel count
    pub channels: u16,

    /// Frame length per channel; a frame holds this many samples times `channels`
    pub frame_samples_per_channel: usize,

    /// Samples per write in the playback loop (independent of frame size)
    pub playback_chunk_len: usize,

    /// Hard cap on a single capture session
    pub max_recording: Duration,

    pub eq: EqConfig,
    pub gain: GainConfig,
    pub analyzer: AnalyzerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frame_samples_per_channel: DEFAULT_FRAME_SAMPLES_PER_CHANNEL,
            playback_chunk_len: DEFAULT_PLAYBACK_CHUNK_LEN,
            max_recording: DEFAULT_MAX_RECORDING,
            eq: EqConfig::default(),
            gain: GainConfig::default(),
            analyzer: AnalyzerConfig {
                sample_rate: DEFAULT_SAMPLE_RATE as f64,
                ..AnalyzerConfig::default()
            },
        }
    }
}

impl PipelineConfig {
    /// Interleaved frame length in samples
    pub fn frame_len(&self) -> usize {
        self.frame_samples_per_channel * self.channels as usize
    }

    /// Frame duration at the configured sample rate
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_samples_per_channel as f64 / self.sample_rate as f64)
    }

    /// Maximum number of interleaved samples a capture session may record
    pub fn max_recording_samples(&self) -> usize {
        let per_channel = self.max_recording.as_secs_f64() * self.sample_rate as f64;
        per_channel as usize * self.channels as usize
    }

    /// Check every parameter; the first violation is returned as a configuration error
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::config("sample rate must be positive"));
        }
        if self.channels == 0 {
            return Err(AudioError::config("channel count must be positive"));
        }
        if self.frame_samples_per_channel == 0 {
            return Err(AudioError::config("frame length must be positive"));
        }
        if self.playback_chunk_len == 0 {
            return Err(AudioError::config("playback chunk length must be positive"));
        }
        if self.playback_chunk_len % self.channels as usize != 0 {
            return Err(AudioError::config(format!(
                "playback chunk length {} is not a multiple of {} channels",
                self.playback_chunk_len, self.channels
            )));
        }
        if self.max_recording.is_zero() {
            return Err(AudioError::config("max recording duration must be positive"));
        }
        if (self.analyzer.sample_rate - self.sample_rate as f64).abs() > f64::EPSILON {
            return Err(AudioError::config(format!(
                "analyzer sample rate {} does not match pipeline sample rate {}",
                self.analyzer.sample_rate, self.sample_rate
            )));
        }
        self.eq.validate(self.sample_rate as f64)?;
        self.gain.validate()?;
        self.analyzer.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_len(), 1920);
        assert_eq!(config.frame_duration(), Duration::from_millis(20));
        assert_eq!(config.max_recording_samples(), 60 * 48000 * 2);
    }

    #[test]
    fn test_rejects_zero_frame_length() {
        let config = PipelineConfig {
            frame_samples_per_channel: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(AudioError::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_channels_and_chunk() {
        let config = PipelineConfig { channels: 0, ..PipelineConfig::default() };
        assert!(config.validate().is_err());

        let config = PipelineConfig { playback_chunk_len: 0, ..PipelineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_chunk_splitting_frames() {
        let config = PipelineConfig {
            channels: 2,
            playback_chunk_len: 3,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(AudioError::Configuration(_))));

        let config = PipelineConfig {
            channels: 3,
            playback_chunk_len: 1023,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_mismatched_analyzer_rate() {
        let mut config = PipelineConfig::default();
        config.analyzer.sample_rate = 44100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_band_above_nyquist() {
        let mut config = PipelineConfig { sample_rate: 4000, ..PipelineConfig::default() };
        config.analyzer.sample_rate = 4000.0;
        // Treble band at 3 kHz is above 2 kHz Nyquist
        assert!(config.validate().is_err());
    }
}
