//! Python bindings for the audio pipeline driving cpal devices
//!
//! Spectra are delivered on the capture thread; Python polls the latest one.

use numpy::PyArray1;
use pyo3::prelude::*;
use std::sync::{Arc, Mutex};

use super::to_py_err;
use crate::audio::{
    list_input_devices, list_output_devices, CaptureDevice, CpalCapture, CpalOutput, FfmpegDecoder,
    OutputDevice, StartStatus,
};
use crate::config::{PipelineConfig, DEFAULT_PLAYBACK_CHUNK_LEN};
use crate::pipeline::AudioPipeline;
use crate::spectrum::SpectrumAnalyzer;

/// Audio pipeline exposed to Python
#[pyclass(name = "AudioPipeline", unsendable)]
pub struct PyAudioPipeline {
    pipeline: AudioPipeline,
    latest: Arc<Mutex<Option<Vec<f64>>>>,
    frequencies: Vec<f64>,
}

impl PyAudioPipeline {
    fn open_output(&self, device: Option<String>) -> PyResult<Box<dyn OutputDevice>> {
        let config = self.pipeline.config();
        let output = CpalOutput::open(device, config.sample_rate, config.channels).map_err(to_py_err)?;
        Ok(Box::new(output))
    }
}

#[pymethods]
impl PyAudioPipeline {
    /// Create a new pipeline
    ///
    /// Args:
    ///     sample_rate: Sample rate in Hz
    ///     channels: Interleaved channel count
    #[new]
    #[pyo3(signature = (sample_rate=48000, channels=2))]
    fn new(sample_rate: u32, channels: u16) -> PyResult<Self> {
        let mut config = PipelineConfig {
            sample_rate,
            channels,
            frame_samples_per_channel: sample_rate as usize / 50,
            // Round the default chunk down to whole frames
            playback_chunk_len: DEFAULT_PLAYBACK_CHUNK_LEN / channels.max(1) as usize * channels as usize,
            ..PipelineConfig::default()
        };
        config.analyzer.sample_rate = sample_rate as f64;

        let frequencies = SpectrumAnalyzer::new(config.analyzer.clone())
            .map_err(to_py_err)?
            .frequency_bins_hz();
        let pipeline = AudioPipeline::new(config).map_err(to_py_err)?;

        let latest = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&latest);
        pipeline.set_spectrum_listener(move |spectrum: &[f64]| {
            if let Ok(mut latest) = slot.lock() {
                *latest = Some(spectrum.to_vec());
            }
        });

        Ok(Self {
            pipeline,
            latest,
            frequencies,
        })
    }

    /// Start capturing from an input device
    ///
    /// Args:
    ///     monitor: Also play the equalized signal (use headphones!)
    ///     input_device: Input device name, default device if None
    ///     output_device: Output device name, default device if None
    ///
    /// Returns:
    ///     Input device name as string
    #[pyo3(signature = (monitor=false, input_device=None, output_device=None))]
    fn start_capture(
        &mut self,
        monitor: bool,
        input_device: Option<String>,
        output_device: Option<String>,
    ) -> PyResult<String> {
        let config = self.pipeline.config();
        let capture = CpalCapture::open(input_device, config.sample_rate, config.channels).map_err(to_py_err)?;
        let name = capture.device_info().name.clone();

        let output = if monitor {
            Some(self.open_output(output_device)?)
        } else {
            None
        };

        let capture: Box<dyn CaptureDevice> = Box::new(capture);
        self.pipeline.start_capture(capture, output).map_err(to_py_err)?;
        Ok(name)
    }

    /// Stop capture
    fn stop_capture(&mut self) {
        self.pipeline.stop_capture();
    }

    /// Decode a compressed file with ffmpeg and play it through the equalizer
    #[pyo3(signature = (path, monitor=true, output_device=None))]
    fn start_decoding(&mut self, path: String, monitor: bool, output_device: Option<String>) -> PyResult<()> {
        let config = self.pipeline.config();
        let decoder = FfmpegDecoder::new(config.sample_rate, config.channels);
        let output = if monitor {
            Some(self.open_output(output_device)?)
        } else {
            None
        };
        self.pipeline
            .start_decoding(path, Box::new(decoder), output)
            .map_err(to_py_err)
    }

    /// Cancel decoding
    fn stop_decoding(&mut self) {
        self.pipeline.stop_decoding();
    }

    /// Loop the recording through the equalizer
    ///
    /// Returns:
    ///     "started", "already_playing" or "empty_buffer"
    #[pyo3(signature = (output_device=None))]
    fn start_playback(&mut self, output_device: Option<String>) -> PyResult<&'static str> {
        if self.pipeline.is_playing() {
            return Ok("already_playing");
        }
        let output = self.open_output(output_device)?;
        let status = self.pipeline.start_playback(output).map_err(to_py_err)?;
        Ok(match status {
            StartStatus::Started => "started",
            StartStatus::AlreadyPlaying => "already_playing",
            StartStatus::EmptyBuffer => "empty_buffer",
        })
    }

    /// Stop playback
    fn stop_playback(&mut self) {
        self.pipeline.stop_playback();
    }

    fn set_bass_gain(&self, gain: f64) -> PyResult<()> {
        self.pipeline.set_bass_gain(gain).map_err(to_py_err)
    }

    fn set_mid_gain(&self, gain: f64) -> PyResult<()> {
        self.pipeline.set_mid_gain(gain).map_err(to_py_err)
    }

    fn set_treble_gain(&self, gain: f64) -> PyResult<()> {
        self.pipeline.set_treble_gain(gain).map_err(to_py_err)
    }

    /// Current (bass, mid, treble) gains
    fn gains(&self) -> (f64, f64, f64) {
        self.pipeline.gains()
    }

    /// Latest smoothed normalizer scale of capture or decoding
    fn current_scale(&self) -> f64 {
        self.pipeline.current_scale()
    }

    /// Latest smoothed normalizer scale of the playback loop
    fn playback_scale(&self) -> f64 {
        self.pipeline.playback_scale()
    }

    /// Latest spectrum, or None if no new one arrived since the last call
    fn latest_spectrum<'py>(&self, py: Python<'py>) -> Option<&'py PyArray1<f64>> {
        let spectrum = self.latest.lock().ok().and_then(|mut latest| latest.take())?;
        Some(PyArray1::from_vec(py, spectrum))
    }

    /// Frequency of each spectrum bin in Hz
    fn frequency_bins_hz<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        PyArray1::from_vec(py, self.frequencies.clone())
    }

    /// Recorded raw signal as interleaved int16
    fn recording<'py>(&self, py: Python<'py>) -> &'py PyArray1<i16> {
        PyArray1::from_vec(py, self.pipeline.recording())
    }

    fn clear_recording(&self) {
        self.pipeline.clear_recording();
    }

    fn is_capturing(&self) -> bool {
        self.pipeline.is_capturing()
    }

    fn is_playing(&self) -> bool {
        self.pipeline.is_playing()
    }

    fn is_decoding(&self) -> bool {
        self.pipeline.is_decoding()
    }

    /// List available input devices
    #[staticmethod]
    fn list_input_devices() -> PyResult<Vec<String>> {
        list_input_devices()
            .map(|devices| devices.into_iter().map(|d| d.name).collect())
            .map_err(to_py_err)
    }

    /// List available output devices
    #[staticmethod]
    fn list_output_devices() -> PyResult<Vec<String>> {
        list_output_devices()
            .map(|devices| devices.into_iter().map(|d| d.name).collect())
            .map_err(to_py_err)
    }
}
