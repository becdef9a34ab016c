//! cpal stream plumbing shared by capture and output devices

use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use log::{debug, warn};
use std::sync::mpsc;
use std::thread::JoinHandle;

/// Audio device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Stream configuration agreed with a device
#[derive(Debug, Clone)]
pub(crate) struct NegotiatedConfig {
    pub stream_config: StreamConfig,
    pub sample_format: SampleFormat,
}

/// Pick a device configuration running at exactly `sample_rate`
///
/// Prefers a config with the requested channel count; otherwise takes any
/// channel layout at that rate and lets the caller remix.
pub(crate) fn negotiate<I>(
    ranges: I,
    default_rate: u32,
    sample_rate: u32,
    channels: u16,
) -> Result<NegotiatedConfig>
where
    I: IntoIterator<Item = SupportedStreamConfigRange>,
{
    let at_rate: Vec<SupportedStreamConfigRange> = ranges
        .into_iter()
        .filter(|r| r.min_sample_rate().0 <= sample_rate && sample_rate <= r.max_sample_rate().0)
        .collect();

    if at_rate.is_empty() {
        return Err(AudioError::UnsupportedSampleRate {
            expected: sample_rate,
            found: default_rate,
        });
    }

    let chosen = at_rate
        .iter()
        .find(|r| r.channels() == channels)
        .or_else(|| at_rate.iter().max_by_key(|r| r.channels()))
        .cloned()
        .ok_or(AudioError::UnsupportedChannels { expected: channels, found: 0 })?;

    let supported = chosen.with_sample_rate(SampleRate(sample_rate));
    Ok(NegotiatedConfig {
        sample_format: supported.sample_format(),
        stream_config: supported.into(),
    })
}

/// Copy interleaved frames between channel layouts
///
/// Extra source channels are dropped; missing ones repeat the last source channel.
pub(crate) fn remix_interleaved(input: &[i16], from: usize, to: usize, output: &mut Vec<i16>) {
    output.clear();
    if from == to {
        output.extend_from_slice(input);
        return;
    }
    for frame in input.chunks_exact(from) {
        for ch in 0..to {
            output.push(frame[ch.min(from - 1)]);
        }
    }
}

/// Owns a cpal stream on a dedicated thread
///
/// cpal streams cannot cross threads, so the stream is built, played and
/// dropped on its own thread. Dropping the host stops the stream and joins.
pub(crate) struct StreamHost {
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamHost {
    /// Build and start a stream on a new thread
    ///
    /// # Arguments
    /// * `name` - Thread name
    /// * `build` - Opens the device and builds the stream; its info is returned
    pub fn spawn<F>(name: &str, build: F) -> Result<(Self, AudioDeviceInfo)>
    where
        F: FnOnce() -> Result<(cpal::Stream, AudioDeviceInfo)> + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<AudioDeviceInfo>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let (stream, info) = match build() {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::PlayStream(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(info));

                // Blocks until the host is dropped
                let _ = shutdown_rx.recv();
                if let Err(e) = stream.pause() {
                    debug!("Failed to pause stream: {}", e);
                }
            })
            .map_err(|e| AudioError::DeviceUnavailable(format!("failed to spawn stream thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(info)) => Ok((
                Self {
                    shutdown: Some(shutdown_tx),
                    thread: Some(thread),
                },
                info,
            )),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::DeviceUnavailable("stream thread exited during setup".into()))
            }
        }
    }
}

impl Drop for StreamHost {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the stream thread
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Stream thread panicked during shutdown");
            }
        }
    }
}

/// Device name, or a placeholder when the backend cannot report one
pub(crate) fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(channels: u16, min: u32, max: u32) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            SampleFormat::F32,
        )
    }

    #[test]
    fn test_negotiate_prefers_matching_channels() {
        let config = negotiate(
            vec![range(1, 8000, 96000), range(2, 8000, 96000)],
            44100,
            48000,
            2,
        )
        .unwrap();
        assert_eq!(config.stream_config.channels, 2);
        assert_eq!(config.stream_config.sample_rate.0, 48000);
    }

    #[test]
    fn test_negotiate_falls_back_to_other_layout() {
        let config = negotiate(vec![range(1, 48000, 48000)], 48000, 48000, 2).unwrap();
        assert_eq!(config.stream_config.channels, 1);
    }

    #[test]
    fn test_negotiate_rejects_rate() {
        let err = negotiate(vec![range(2, 44100, 44100)], 44100, 48000, 2).unwrap_err();
        assert_eq!(err, AudioError::UnsupportedSampleRate { expected: 48000, found: 44100 });
    }

    #[test]
    fn test_remix_mono_to_stereo() {
        let mut out = Vec::new();
        remix_interleaved(&[1, 2, 3], 1, 2, &mut out);
        assert_eq!(out, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_remix_drops_extra_channels() {
        let mut out = Vec::new();
        remix_interleaved(&[1, 2, 3, 4, 5, 6], 3, 2, &mut out);
        assert_eq!(out, vec![1, 2, 4, 5]);
    }
}
