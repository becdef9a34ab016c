//! Owned pipeline handle
//!
//! One `AudioPipeline` per application. It owns the state shared between
//! control threads and workers (EQ gains, the published normalizer scales,
//! the spectrum listener, the recording) and the three workers themselves.
//! Capture and decoding never run together and share one published scale;
//! playback publishes its own.
//! Collaborators receive a reference to it; there is no global instance.

use crate::audio::capture::{CaptureSession, FramePath, ListenerSlot, RecordingBuffer};
use crate::audio::decode::{DecodeSession, Decoder};
use crate::audio::device::{CaptureDevice, OutputDevice};
use crate::audio::gain::SharedScale;
use crate::audio::playback::{PlaybackLoop, StartStatus};
use crate::audio::processor::SignalChain;
use crate::audio::worker::LoopExit;
use crate::config::PipelineConfig;
use crate::error::{AudioError, Result};
use crate::filters::equalizer::{Band, EqGains};
use crate::spectrum::SpectrumAnalyzer;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Distinguishes decoder scratch files of pipelines in one process
static NEXT_SCRATCH_ID: AtomicUsize = AtomicUsize::new(0);

pub struct AudioPipeline {
    config: PipelineConfig,
    gains: Arc<EqGains>,
    capture_scale: Arc<SharedScale>,
    playback_scale: Arc<SharedScale>,
    listener: ListenerSlot,
    recording: RecordingBuffer,
    capture: CaptureSession,
    playback: PlaybackLoop,
    decode: DecodeSession,
    scratch_dir: PathBuf,
    scratch_id: usize,
}

impl AudioPipeline {
    /// Create an idle pipeline
    ///
    /// Fails with a configuration error if any parameter is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            gains: Arc::new(EqGains::default()),
            capture_scale: Arc::new(SharedScale::default()),
            playback_scale: Arc::new(SharedScale::default()),
            listener: ListenerSlot::default(),
            recording: RecordingBuffer::new(config.max_recording_samples()),
            capture: CaptureSession::new(),
            playback: PlaybackLoop::new(config.playback_chunk_len, config.channels)?,
            decode: DecodeSession::new(),
            scratch_dir: std::env::temp_dir(),
            scratch_id: NEXT_SCRATCH_ID.fetch_add(1, Ordering::Relaxed),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Directory for decoder output (defaults to the system temp dir)
    pub fn set_scratch_dir(&mut self, dir: impl Into<PathBuf>) {
        self.scratch_dir = dir.into();
    }

    /// Start a capture session, stopping any running decode first
    ///
    /// The recording is restarted. Processed frames go to `output` when given.
    ///
    /// # Errors
    /// The device format must match the configured rate and channel count;
    /// on mismatch nothing is started.
    pub fn start_capture(
        &mut self,
        capture: Box<dyn CaptureDevice>,
        output: Option<Box<dyn OutputDevice>>,
    ) -> Result<()> {
        self.check_format(capture.sample_rate(), capture.channels())?;
        let path = self.frame_path()?;

        self.stop_decoding();
        self.stop_capture();
        self.recording.clear();
        self.capture_scale.store(1.0);

        self.capture.start(capture, output, path, self.config.max_recording)
    }

    /// Stop capture and join; idempotent
    pub fn stop_capture(&mut self) {
        self.capture.stop();
    }

    /// Decode `input` with `decoder` and feed it through the frame path
    ///
    /// Stops any running capture first. The decoded signal becomes the new
    /// recording.
    pub fn start_decoding(
        &mut self,
        input: impl AsRef<Path>,
        decoder: Box<dyn Decoder>,
        output: Option<Box<dyn OutputDevice>>,
    ) -> Result<()> {
        let path = self.frame_path()?;

        self.stop_capture();
        self.stop_decoding();
        self.recording.clear();
        self.capture_scale.store(1.0);

        let scratch = self
            .scratch_dir
            .join(format!("signal-lab-{}-{}-decoded.pcm", std::process::id(), self.scratch_id));
        self.decode.start(
            input.as_ref().to_path_buf(),
            scratch,
            decoder,
            output,
            path,
            self.config.sample_rate,
            self.config.channels,
        )
    }

    /// Cancel the decoder and stop replay; idempotent
    pub fn stop_decoding(&mut self) {
        self.decode.stop();
    }

    /// Loop the current recording to `output` through the equalizer
    pub fn start_playback(&mut self, output: Box<dyn OutputDevice>) -> Result<StartStatus> {
        let buffer = self.recording.snapshot();
        self.start_playback_buffer(buffer, output)
    }

    /// Loop an arbitrary interleaved buffer to `output` through the equalizer
    pub fn start_playback_buffer(
        &mut self,
        buffer: impl Into<Arc<[i16]>>,
        output: Box<dyn OutputDevice>,
    ) -> Result<StartStatus> {
        if self.playback.is_playing() {
            info!("Playback already running, start ignored");
            return Ok(StartStatus::AlreadyPlaying);
        }
        let chain = self.signal_chain(&self.playback_scale)?;
        // No playback loop is running, so nothing else publishes here
        self.playback_scale.store(1.0);
        self.playback.start_processed(buffer.into(), output, chain)
    }

    /// Stop playback and join; idempotent
    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }

    pub fn set_bass_gain(&self, gain: f64) -> Result<()> {
        self.gains.set(Band::Bass, gain)
    }

    pub fn set_mid_gain(&self, gain: f64) -> Result<()> {
        self.gains.set(Band::Mid, gain)
    }

    pub fn set_treble_gain(&self, gain: f64) -> Result<()> {
        self.gains.set(Band::Treble, gain)
    }

    /// Current (bass, mid, treble) gains
    pub fn gains(&self) -> (f64, f64, f64) {
        self.gains.snapshot()
    }

    /// Register the spectrum listener, replacing any previous one
    ///
    /// Called on the worker thread once per analysis frame, in frame order.
    pub fn set_spectrum_listener<F>(&self, listener: F)
    where
        F: FnMut(&[f64]) + Send + 'static,
    {
        self.listener.set(Box::new(listener));
    }

    pub fn clear_spectrum_listener(&self) {
        self.listener.clear();
    }

    /// Copy of the recorded raw signal
    pub fn recording(&self) -> Vec<i16> {
        self.recording.snapshot()
    }

    pub fn clear_recording(&self) {
        self.recording.clear();
    }

    /// Latest smoothed normalizer scale of capture or decoding
    pub fn current_scale(&self) -> f64 {
        self.capture_scale.load()
    }

    /// Latest smoothed normalizer scale of the playback loop
    pub fn playback_scale(&self) -> f64 {
        self.playback_scale.load()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_running()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn is_decoding(&self) -> bool {
        self.decode.is_running()
    }

    pub fn capture_exit(&self) -> Option<LoopExit> {
        self.capture.last_exit()
    }

    pub fn playback_exit(&self) -> Option<LoopExit> {
        self.playback.last_exit()
    }

    pub fn decode_exit(&self) -> Option<LoopExit> {
        self.decode.last_exit()
    }

    /// Stop every worker
    pub fn stop_all(&mut self) {
        self.stop_capture();
        self.stop_decoding();
        self.stop_playback();
    }

    fn check_format(&self, sample_rate: u32, channels: u16) -> Result<()> {
        if sample_rate != self.config.sample_rate {
            return Err(AudioError::UnsupportedSampleRate {
                expected: self.config.sample_rate,
                found: sample_rate,
            });
        }
        if channels != self.config.channels {
            return Err(AudioError::UnsupportedChannels {
                expected: self.config.channels,
                found: channels,
            });
        }
        Ok(())
    }

    fn signal_chain(&self, scale: &Arc<SharedScale>) -> Result<SignalChain> {
        SignalChain::new(&self.config, Arc::clone(&self.gains), Arc::clone(scale))
    }

    fn frame_path(&self) -> Result<FramePath> {
        FramePath::new(
            self.config.frame_len(),
            self.signal_chain(&self.capture_scale)?,
            SpectrumAnalyzer::new(self.config.analyzer.clone())?,
            self.listener.clone(),
            Some(self.recording.clone()),
        )
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
