//! Looped playback of an accumulated buffer
//!
//! STOPPED -> PLAYING -> STOPPED. While playing, the buffer is written to the
//! output device in fixed-size chunks, wrapping to the start at the end.

use crate::audio::device::{FailureCounter, OutputDevice};
use crate::audio::processor::SignalChain;
use crate::audio::worker::{LoopExit, RunFlag, Worker};
use crate::error::{AudioError, Result};
use log::{info, warn};
use std::sync::Arc;

/// Outcome of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    Started,
    /// Rejected: a loop is already running
    AlreadyPlaying,
    /// Rejected: nothing to play
    EmptyBuffer,
}

/// Playback worker handle
pub struct PlaybackLoop {
    worker: Worker,
    chunk_len: usize,
    channels: usize,
}

impl PlaybackLoop {
    /// # Arguments
    /// * `chunk_len` - Samples per write, independent of the analysis frame size;
    ///   must hold whole interleaved frames
    /// * `channels` - Interleaved channel count of the buffers to play
    pub fn new(chunk_len: usize, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(AudioError::config("channel count must be positive"));
        }
        if chunk_len == 0 {
            return Err(AudioError::config("playback chunk length must be positive"));
        }
        let channels = channels as usize;
        if chunk_len % channels != 0 {
            return Err(AudioError::config(format!(
                "playback chunk length {chunk_len} is not a multiple of {channels} channels"
            )));
        }

        Ok(Self {
            worker: Worker::new("signal-lab-playback"),
            chunk_len,
            channels,
        })
    }

    /// Start looping `buffer` to `output` unchanged
    pub fn start(&mut self, buffer: Arc<[i16]>, output: Box<dyn OutputDevice>) -> Result<StartStatus> {
        self.start_inner(buffer, output, None)
    }

    /// Start looping `buffer` through `chain` to `output`
    pub fn start_processed(
        &mut self,
        buffer: Arc<[i16]>,
        output: Box<dyn OutputDevice>,
        chain: SignalChain,
    ) -> Result<StartStatus> {
        self.start_inner(buffer, output, Some(chain))
    }

    fn start_inner(
        &mut self,
        buffer: Arc<[i16]>,
        mut output: Box<dyn OutputDevice>,
        mut chain: Option<SignalChain>,
    ) -> Result<StartStatus> {
        if self.worker.is_running() {
            info!("Playback already running, start ignored");
            return Ok(StartStatus::AlreadyPlaying);
        }
        if buffer.is_empty() {
            info!("Playback buffer is empty, start ignored");
            return Ok(StartStatus::EmptyBuffer);
        }
        // Every chunk, including the tail, must start on channel 0
        if buffer.len() % self.channels != 0 {
            return Err(AudioError::config(format!(
                "playback buffer of {} samples is not a multiple of {} channels",
                buffer.len(),
                self.channels
            )));
        }
        if let Some(chain) = &chain {
            if chain.channels() != self.channels {
                return Err(AudioError::config(format!(
                    "signal chain has {} channels, playback expects {}",
                    chain.channels(),
                    self.channels
                )));
            }
        }

        let chunk_len = self.chunk_len;
        info!("Starting playback of {} samples in chunks of {}", buffer.len(), chunk_len);

        self.worker.spawn(move |flag| {
            play_looped(&flag, &buffer, chunk_len, output.as_mut(), chain.as_mut())
        })?;
        Ok(StartStatus::Started)
    }

    /// Stop and join; the output device is released before this returns
    pub fn stop(&mut self) {
        self.worker.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.worker.is_running()
    }

    pub fn last_exit(&self) -> Option<LoopExit> {
        self.worker.last_exit()
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

fn play_looped(
    flag: &RunFlag,
    buffer: &[i16],
    chunk_len: usize,
    output: &mut dyn OutputDevice,
    mut chain: Option<&mut SignalChain>,
) -> LoopExit {
    let mut index = 0;
    let mut failures = FailureCounter::default();
    let mut scratch = Vec::with_capacity(chunk_len);

    // Chunk at `index` has already been through the chain into `scratch`
    let mut processed = false;

    while flag.is_running() {
        let end = (index + chunk_len).min(buffer.len());
        let chunk = &buffer[index..end];

        let result = match chain.as_deref_mut() {
            Some(chain) => {
                if !processed {
                    scratch.clear();
                    scratch.extend_from_slice(chunk);
                    chain.process_inplace(&mut scratch);
                    processed = true;
                }
                output.write(&scratch)
            }
            None => output.write(chunk),
        };

        match result {
            Ok(()) => failures.record_success(),
            Err(e) => {
                warn!("Playback write failed: {}", e);
                if failures.record_failure() {
                    return LoopExit::DeviceFailed(format!("output: {e}"));
                }
                // Retry the same samples; filter state has already advanced
                continue;
            }
        }

        processed = false;
        index = if end >= buffer.len() { 0 } else { end };
    }

    LoopExit::Stopped
}
