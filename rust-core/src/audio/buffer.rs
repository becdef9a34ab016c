//! Lock-free ring buffer for audio data
//!
//! Single-producer single-consumer queue bridging cpal callbacks and the
//! blocking worker threads

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::time::{Duration, Instant};

/// Poll interval while waiting on the other end of the ring
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Thread-safe audio ring buffer
pub struct AudioRingBuffer {
    producer: HeapProducer<i16>,
    consumer: HeapConsumer<i16>,
    capacity: usize,
}

impl AudioRingBuffer {
    /// Create new ring buffer with given capacity
    ///
    /// # Arguments
    /// * `capacity` - Buffer capacity in samples
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<i16>::new(capacity);
        let (producer, consumer) = rb.split();

        Self {
            producer,
            consumer,
            capacity,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
                capacity: self.capacity,
            },
            AudioConsumer {
                consumer: self.consumer,
                capacity: self.capacity,
            },
        )
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Producer end of audio ring buffer (for writing)
pub struct AudioProducer {
    producer: HeapProducer<i16>,
    capacity: usize,
}

impl AudioProducer {
    /// Write samples to buffer
    ///
    /// # Returns
    /// Number of samples actually written (may be less if buffer is full)
    pub fn write(&mut self, samples: &[i16]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Write every sample, waiting for space
    ///
    /// # Returns
    /// `false` if no progress was made for `stall_timeout`
    pub fn write_all(&mut self, samples: &[i16], stall_timeout: Duration) -> bool {
        let mut written = 0;
        let mut last_progress = Instant::now();

        while written < samples.len() {
            let n = self.producer.push_slice(&samples[written..]);
            if n > 0 {
                written += n;
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= stall_timeout {
                return false;
            } else {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
        true
    }

    /// Get number of free slots
    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consumer end of audio ring buffer (for reading)
pub struct AudioConsumer {
    consumer: HeapConsumer<i16>,
    capacity: usize,
}

impl AudioConsumer {
    /// Read samples from buffer
    ///
    /// # Returns
    /// Number of samples actually read (may be less if buffer doesn't have enough)
    pub fn read(&mut self, buffer: &mut [i16]) -> usize {
        self.consumer.pop_slice(buffer)
    }

    /// Read whatever is available, waiting up to `timeout` for the first sample
    pub fn read_timeout(&mut self, buffer: &mut [i16], timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        loop {
            let n = self.consumer.pop_slice(buffer);
            if n > 0 || Instant::now() >= deadline {
                return n;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Get number of available samples
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
