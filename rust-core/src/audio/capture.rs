//! Capture worker: device -> frames -> {chain -> output, spectrum -> listener}
//!
//! The same frame path also serves decoded files (see `decode`).

use crate::audio::device::{CaptureDevice, FailureCounter, OutputDevice};
use crate::audio::frame::FrameAssembler;
use crate::audio::processor::SignalChain;
use crate::audio::worker::{LoopExit, RunFlag, Worker};
use crate::error::{AudioError, Result};
use crate::sample;
use crate::spectrum::SpectrumAnalyzer;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Wait between polls of a live device that had nothing ready
const IDLE_WAIT: Duration = Duration::from_micros(100);

/// Callback receiving one magnitude spectrum per analysis frame
pub type SpectrumListener = Box<dyn FnMut(&[f64]) + Send>;

#[derive(Default)]
struct SlotState {
    listener: Option<SpectrumListener>,
    /// Bumped by every `set`/`clear`
    generation: u64,
}

/// Single-listener registration shared between callers and workers
///
/// The listener runs without the slot lock held, so it may itself register
/// or clear listeners. A replacement made during a call takes effect from
/// the next frame.
#[derive(Clone, Default)]
pub struct ListenerSlot(Arc<Mutex<SlotState>>);

impl ListenerSlot {
    /// Register a listener, replacing any previous one
    pub fn set(&self, listener: SpectrumListener) {
        if let Ok(mut slot) = self.0.lock() {
            slot.listener = Some(listener);
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.0.lock() {
            slot.listener = None;
            slot.generation = slot.generation.wrapping_add(1);
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.lock().map(|slot| slot.listener.is_some()).unwrap_or(false)
    }

    fn deliver(&self, spectrum: &[f64]) {
        let taken = match self.0.lock() {
            Ok(mut slot) => {
                let generation = slot.generation;
                slot.listener.take().map(|listener| (listener, generation))
            }
            Err(_) => None,
        };
        let Some((mut listener, generation)) = taken else {
            return;
        };

        listener(spectrum);

        if let Ok(mut slot) = self.0.lock() {
            // Put it back unless it was replaced or cleared meanwhile
            if slot.generation == generation {
                slot.listener = Some(listener);
            }
        }
    }
}

/// Raw captured signal, bounded by the recording cap
#[derive(Clone)]
pub struct RecordingBuffer {
    samples: Arc<Mutex<Vec<i16>>>,
    limit: usize,
}

impl RecordingBuffer {
    /// # Arguments
    /// * `limit` - Maximum number of interleaved samples kept
    pub fn new(limit: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            limit,
        }
    }

    /// Append what fits under the limit
    ///
    /// # Returns
    /// Number of samples stored
    pub fn append(&self, frame: &[i16]) -> usize {
        match self.samples.lock() {
            Ok(mut samples) => {
                let take = self.limit.saturating_sub(samples.len()).min(frame.len());
                samples.extend_from_slice(&frame[..take]);
                take
            }
            Err(_) => 0,
        }
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<i16> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut samples) = self.samples.lock() {
            samples.clear();
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Everything a completed frame flows through
pub struct FramePath {
    assembler: FrameAssembler<i16>,
    chain: SignalChain,
    analyzer: SpectrumAnalyzer,
    listener: ListenerSlot,
    recording: Option<RecordingBuffer>,
    channels: usize,
}

impl FramePath {
    /// # Arguments
    /// * `frame_len` - Interleaved samples per frame
    /// * `chain` - Equalizer and normalizer applied before output
    /// * `analyzer` - Fed the mono mix of each frame while a listener is set
    /// * `listener` - Spectrum listener registration
    /// * `recording` - Receives the raw frames, if recording
    pub fn new(
        frame_len: usize,
        chain: SignalChain,
        analyzer: SpectrumAnalyzer,
        listener: ListenerSlot,
        recording: Option<RecordingBuffer>,
    ) -> Result<Self> {
        let channels = chain.channels();
        if frame_len % channels != 0 {
            return Err(AudioError::config(format!(
                "frame length {frame_len} is not a multiple of {channels} channel(s)"
            )));
        }

        Ok(Self {
            assembler: FrameAssembler::new(frame_len)?,
            chain,
            analyzer,
            listener,
            recording,
            channels,
        })
    }
}

/// Per-loop state behind the assembler
struct FrameSink<'a> {
    chain: SignalChain,
    analyzer: SpectrumAnalyzer,
    listener: ListenerSlot,
    recording: Option<RecordingBuffer>,
    channels: usize,
    output: Option<&'a mut dyn OutputDevice>,
    write_failures: FailureCounter,
    recording_full: bool,
    mono: Vec<f64>,
    spectrum: Vec<f64>,
    processed: Vec<i16>,
}

impl<'a> FrameSink<'a> {
    /// Handle one completed frame; `Err` carries a terminal device failure
    fn on_frame(&mut self, frame: &[i16]) -> std::result::Result<(), String> {
        if let Some(recording) = &self.recording {
            if !self.recording_full && recording.append(frame) < frame.len() {
                info!("Recording buffer full ({} samples)", recording.limit());
                self.recording_full = true;
            }
        }

        if self.listener.is_set() {
            sample::downmix_to_mono(frame, self.channels, &mut self.mono);
            self.analyzer.analyze_into(&self.mono, &mut self.spectrum);
            self.listener.deliver(&self.spectrum);
        }

        self.processed.clear();
        self.processed.extend_from_slice(frame);
        self.chain.process_inplace(&mut self.processed);

        if let Some(output) = self.output.as_deref_mut() {
            match output.write(&self.processed) {
                Ok(()) => self.write_failures.record_success(),
                Err(e) => {
                    warn!("Output write failed: {}", e);
                    if self.write_failures.record_failure() {
                        return Err(format!("output: {e}"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Drive `source` through the frame path until stopped or exhausted
///
/// # Arguments
/// * `flag` - Checked at the top of every iteration
/// * `source` - Live device or finite file source
/// * `output` - Receives processed frames, if any
/// * `path` - Assembler, chain, analyzer and sinks
/// * `deadline` - Wall-clock cap for the session
pub(crate) fn run_frame_loop(
    flag: &RunFlag,
    source: &mut dyn CaptureDevice,
    output: Option<&mut dyn OutputDevice>,
    path: FramePath,
    deadline: Option<Instant>,
) -> LoopExit {
    let FramePath {
        mut assembler,
        chain,
        analyzer,
        listener,
        recording,
        channels,
    } = path;
    let mut read_buf = vec![0i16; assembler.frame_len()];
    let mut read_failures = FailureCounter::default();
    let mut sink = FrameSink {
        chain,
        analyzer,
        listener,
        recording,
        channels,
        output,
        write_failures: FailureCounter::default(),
        recording_full: false,
        mono: Vec::new(),
        spectrum: Vec::new(),
        processed: Vec::new(),
    };

    loop {
        if !flag.is_running() {
            return LoopExit::Stopped;
        }
        if deadline.map_or(false, |d| Instant::now() >= d) {
            return LoopExit::DurationCap;
        }

        let n = match source.read(&mut read_buf) {
            Ok(n) => {
                read_failures.record_success();
                n
            }
            Err(e) => {
                warn!("Capture read failed: {}", e);
                if read_failures.record_failure() {
                    return LoopExit::DeviceFailed(format!("capture: {e}"));
                }
                continue;
            }
        };

        if n == 0 {
            if source.is_finite() {
                if assembler.pending_len() > 0 {
                    debug!("Dropping {} trailing samples short of a frame", assembler.pending_len());
                }
                return LoopExit::EndOfStream;
            }
            std::thread::sleep(IDLE_WAIT);
            continue;
        }

        let mut failure = None;
        assembler.push(&read_buf[..n], |frame| {
            if failure.is_none() {
                if let Err(e) = sink.on_frame(frame) {
                    failure = Some(e);
                }
            }
        });
        if let Some(msg) = failure {
            return LoopExit::DeviceFailed(msg);
        }
    }
}

/// Capture worker handle
pub struct CaptureSession {
    worker: Worker,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            worker: Worker::new("signal-lab-capture"),
        }
    }

    /// Start capturing on a worker thread
    ///
    /// The session ends on `stop()`, after `max_duration`, or after three
    /// consecutive device failures.
    pub fn start(
        &mut self,
        mut capture: Box<dyn CaptureDevice>,
        mut output: Option<Box<dyn OutputDevice>>,
        path: FramePath,
        max_duration: Duration,
    ) -> Result<()> {
        self.worker.stop();
        info!(
            "Starting capture at {} Hz, {} channel(s), cap {:?}",
            capture.sample_rate(),
            capture.channels(),
            max_duration
        );

        self.worker.spawn(move |flag| {
            let deadline = Instant::now() + max_duration;
            let output = output.as_deref_mut().map(|o| o as &mut dyn OutputDevice);
            run_frame_loop(&flag, capture.as_mut(), output, path, Some(deadline))
        })
    }

    /// Stop and join; devices are released before this returns
    pub fn stop(&mut self) {
        self.worker.stop();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub fn last_exit(&self) -> Option<LoopExit> {
        self.worker.last_exit()
    }
}
