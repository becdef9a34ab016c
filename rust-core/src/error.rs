//! Error types shared by the DSP core and the device workers

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Invalid construction parameters. Never clamped silently.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A capture or output device could not be opened, or failed repeatedly
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A single read/write call failed
    #[error("Audio device I/O error: {0}")]
    DeviceIo(String),

    /// The external decoder failed or produced no output
    #[error("External decoder produced no data: {0}")]
    ExternalProcess(String),

    #[error("No audio device found")]
    NoDevice,

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Device does not support {expected} Hz (found: {found} Hz). Please change the device sample rate in system settings.")]
    UnsupportedSampleRate { expected: u32, found: u32 },

    #[error("Device does not support {expected} channel(s) (max: {found})")]
    UnsupportedChannels { expected: u16, found: u16 },
}

impl AudioError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        AudioError::Configuration(msg.into())
    }

    /// True for errors raised while opening a device, as opposed to a
    /// transient failure during a read or write
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            AudioError::DeviceUnavailable(_)
                | AudioError::NoDevice
                | AudioError::DeviceName(_)
                | AudioError::DefaultConfig(_)
                | AudioError::BuildStream(_)
                | AudioError::PlayStream(_)
                | AudioError::UnsupportedSampleRate { .. }
                | AudioError::UnsupportedChannels { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_classification() {
        assert!(AudioError::NoDevice.is_device_unavailable());
        assert!(AudioError::UnsupportedSampleRate { expected: 48000, found: 44100 }.is_device_unavailable());
        assert!(!AudioError::DeviceIo("underrun".into()).is_device_unavailable());
        assert!(!AudioError::config("bad").is_device_unavailable());
    }

    #[test]
    fn test_error_messages() {
        let err = AudioError::UnsupportedSampleRate { expected: 48000, found: 44100 };
        assert!(err.to_string().contains("48000"));
        assert!(err.to_string().contains("44100"));
    }
}
