//! Device seams between the DSP core and the host
//!
//! The core only needs a blocking read from a capture source and a blocking
//! write to an output sink. cpal-backed implementations live in `input` and
//! `output`; decoded PCM files come from `decode`.

use crate::error::Result;

/// Source of interleaved 16-bit PCM
pub trait CaptureDevice: Send {
    /// Read up to `buffer.len()` samples
    ///
    /// # Returns
    /// Number of samples written into `buffer`. For live devices `Ok(0)`
    /// means no data was ready; for finite sources it means end of stream.
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize>;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// True when the source ends (files), false for live devices
    fn is_finite(&self) -> bool {
        false
    }
}

/// Sink for interleaved 16-bit PCM. Dropping the device releases it.
pub trait OutputDevice: Send {
    /// Write the whole buffer, blocking until accepted
    fn write(&mut self, buffer: &[i16]) -> Result<()>;
}

impl<T: CaptureDevice + ?Sized> CaptureDevice for Box<T> {
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize> {
        (**self).read(buffer)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn channels(&self) -> u16 {
        (**self).channels()
    }

    fn is_finite(&self) -> bool {
        (**self).is_finite()
    }
}

impl<T: OutputDevice + ?Sized> OutputDevice for Box<T> {
    fn write(&mut self, buffer: &[i16]) -> Result<()> {
        (**self).write(buffer)
    }
}

/// Tracks consecutive I/O failures for a worker loop
///
/// A single failure is treated as transient; reaching the limit means the
/// device should be considered unavailable.
#[derive(Debug, Clone)]
pub struct FailureCounter {
    consecutive: u32,
    limit: u32,
}

/// Consecutive failures after which a device is considered gone
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

impl Default for FailureCounter {
    fn default() -> Self {
        Self::new(MAX_CONSECUTIVE_FAILURES)
    }
}

impl FailureCounter {
    pub fn new(limit: u32) -> Self {
        Self { consecutive: 0, limit }
    }

    /// Record a failure; returns true once the limit is reached
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= self.limit
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
