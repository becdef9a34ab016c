//! Audio capture, playback and the per-frame processing path

pub mod buffer;
pub mod capture;
pub mod decode;
pub mod device;
pub mod frame;
pub mod gain;
pub mod input;
pub mod output;
pub mod playback;
pub mod processor;
pub mod stream;
pub mod worker;

pub use buffer::AudioRingBuffer;
pub use capture::{CaptureSession, ListenerSlot, RecordingBuffer, SpectrumListener};
pub use decode::{DecodeSession, Decoder, FfmpegDecoder, PcmFileSource};
pub use device::{CaptureDevice, OutputDevice};
pub use frame::FrameAssembler;
pub use gain::{GainConfig, GainNormalizer};
pub use input::{list_input_devices, CpalCapture};
pub use output::{list_output_devices, CpalOutput};
pub use playback::{PlaybackLoop, StartStatus};
pub use processor::SignalChain;
pub use stream::AudioDeviceInfo;
pub use worker::{LoopExit, RunFlag};
