//! Audio output playback using cpal
//!
//! Real-time playback to speakers or line-out, exposed as a blocking
//! [`OutputDevice`]

use super::buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
use super::device::OutputDevice;
use super::stream::{device_name, negotiate, remix_interleaved, AudioDeviceInfo, StreamHost};
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use log::{error, info};
use std::time::Duration;

/// A write that makes no progress for this long is reported as an I/O error
const STALL_TIMEOUT: Duration = Duration::from_millis(500);

/// Audio output stream drained from a ring buffer
pub struct CpalOutput {
    producer: AudioProducer,
    device_info: AudioDeviceInfo,
    _host: StreamHost,
}

impl CpalOutput {
    /// Open the default output device
    ///
    /// # Arguments
    /// * `sample_rate` - Required rate; devices that cannot run at it are refused
    /// * `channels` - Channel count of the buffers passed to `write`
    pub fn open_default(sample_rate: u32, channels: u16) -> Result<Self> {
        Self::open(None, sample_rate, channels)
    }

    /// Open an output device by name (or the default device for `None`)
    pub fn open(device: Option<String>, sample_rate: u32, channels: u16) -> Result<Self> {
        // 100 ms of buffering keeps latency low while absorbing scheduling jitter
        let capacity = (sample_rate as usize / 10) * channels as usize;
        let (producer, consumer) = AudioRingBuffer::new(capacity.max(1)).split();

        let (host, device_info) = StreamHost::spawn("signal-lab-output", move || {
            build_output(device, sample_rate, channels, consumer)
        })?;

        info!(
            "Output device '{}' opened at {} Hz, {} channel(s)",
            device_info.name, device_info.sample_rate, device_info.channels
        );

        Ok(Self {
            producer,
            device_info,
            _host: host,
        })
    }

    /// Get device information
    pub fn device_info(&self) -> &AudioDeviceInfo {
        &self.device_info
    }
}

impl OutputDevice for CpalOutput {
    fn write(&mut self, buffer: &[i16]) -> Result<()> {
        if self.producer.write_all(buffer, STALL_TIMEOUT) {
            Ok(())
        } else {
            Err(AudioError::DeviceIo(format!(
                "output '{}' stopped consuming samples",
                self.device_info.name
            )))
        }
    }
}

fn build_output(
    name: Option<String>,
    sample_rate: u32,
    channels: u16,
    consumer: AudioConsumer,
) -> Result<(cpal::Stream, AudioDeviceInfo)> {
    let host = cpal::default_host();
    let device = match name {
        Some(wanted) => host
            .output_devices()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or(AudioError::NoDevice)?,
        None => host.default_output_device().ok_or(AudioError::NoDevice)?,
    };

    let default_rate = device
        .default_output_config()
        .map_err(|e| AudioError::DefaultConfig(e.to_string()))?
        .sample_rate()
        .0;
    let ranges = device
        .supported_output_configs()
        .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;
    let negotiated = negotiate(ranges, default_rate, sample_rate, channels)?;

    let device_info = AudioDeviceInfo {
        name: device_name(&device),
        sample_rate,
        channels: negotiated.stream_config.channels,
    };

    let config = &negotiated.stream_config;
    let stream = match negotiated.sample_format {
        SampleFormat::I16 => build_output_stream::<i16>(&device, config, channels, consumer),
        SampleFormat::U16 => build_output_stream::<u16>(&device, config, channels, consumer),
        SampleFormat::I32 => build_output_stream::<i32>(&device, config, channels, consumer),
        SampleFormat::F32 => build_output_stream::<f32>(&device, config, channels, consumer),
        other => Err(AudioError::BuildStream(format!("unsupported sample format {other:?}"))),
    }?;

    Ok((stream, device_info))
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: u16,
    mut consumer: AudioConsumer,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let device_channels = config.channels as usize;
    let channels = channels as usize;
    let mut pending: Vec<i16> = Vec::new();
    let mut remixed: Vec<i16> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Pull whole source frames matching the device frames requested
                let frames = data.len() / device_channels;
                pending.resize(frames * channels, 0);
                let read = consumer.read(&mut pending);
                let read_frames = read / channels;

                remix_interleaved(&pending[..read_frames * channels], channels, device_channels, &mut remixed);

                for (out, &s) in data.iter_mut().zip(remixed.iter()) {
                    *out = T::from_sample(s);
                }

                // Zero remaining samples if not enough data
                for out in data[remixed.len()..].iter_mut() {
                    *out = T::EQUILIBRIUM;
                }
            },
            move |err| {
                error!("Audio output error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}

/// List available audio output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let device_iter = host
        .output_devices()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    for device in device_iter {
        if let Ok(name) = device.name() {
            if let Ok(config) = device.default_output_config() {
                devices.push(AudioDeviceInfo {
                    name,
                    sample_rate: config.sample_rate().0,
                    channels: config.channels(),
                });
            }
        }
    }

    Ok(devices)
}
