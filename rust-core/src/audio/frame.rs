//! Frame assembly from an irregular capture stream
//!
//! Devices deliver chunks of arbitrary size. Downstream stages want fixed
//! frames, so samples are buffered until a full frame is available.

use crate::error::{AudioError, Result};

/// Accumulates interleaved samples into fixed-length frames
///
/// Samples are never dropped or reordered; a partial frame stays pending
/// until later pushes complete it.
#[derive(Debug, Clone)]
pub struct FrameAssembler<T> {
    frame_len: usize,
    pending: Vec<T>,
}

impl<T: Copy> FrameAssembler<T> {
    /// Create an assembler emitting frames of `frame_len` samples
    pub fn new(frame_len: usize) -> Result<Self> {
        if frame_len == 0 {
            return Err(AudioError::config("frame length must be positive"));
        }

        Ok(Self {
            frame_len,
            pending: Vec::with_capacity(frame_len),
        })
    }

    /// Append a chunk and emit every completed frame, oldest first
    ///
    /// # Arguments
    /// * `samples` - Chunk of any size (including empty)
    /// * `on_frame` - Called once per completed frame
    ///
    /// # Returns
    /// Number of frames emitted
    pub fn push<F>(&mut self, samples: &[T], mut on_frame: F) -> usize
    where
        F: FnMut(&[T]),
    {
        let mut emitted = 0;
        let mut rest = samples;

        // Complete the pending partial frame first
        if !self.pending.is_empty() {
            let needed = self.frame_len - self.pending.len();
            let take = needed.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() < self.frame_len {
                return 0;
            }
            on_frame(&self.pending);
            self.pending.clear();
            emitted += 1;
        }

        // Whole frames straight from the input, no copy
        let mut frames = rest.chunks_exact(self.frame_len);
        for frame in &mut frames {
            on_frame(frame);
            emitted += 1;
        }

        self.pending.extend_from_slice(frames.remainder());
        emitted
    }

    /// Append a chunk and collect completed frames into owned vectors
    pub fn push_collect(&mut self, samples: &[T]) -> Vec<Vec<T>> {
        let mut frames = Vec::new();
        self.push(samples, |frame| frames.push(frame.to_vec()));
        frames
    }

    /// Number of buffered samples not yet forming a frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Discard the pending partial frame
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_length() {
        assert!(matches!(
            FrameAssembler::<i16>::new(0),
            Err(AudioError::Configuration(_))
        ));
    }

    #[test]
    fn test_partial_frames_are_buffered() {
        let mut assembler = FrameAssembler::<i16>::new(4).unwrap();
        assert_eq!(assembler.push(&[1, 2, 3], |_| panic!("no frame expected")), 0);
        assert_eq!(assembler.pending_len(), 3);

        let frames = assembler.push_collect(&[4]);
        assert_eq!(frames, vec![vec![1, 2, 3, 4]]);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_irregular_chunks_round_trip() {
        let frame_len = 7;
        let mut assembler = FrameAssembler::<i16>::new(frame_len).unwrap();
        let input: Vec<i16> = (0..200).collect();

        // Chunk sizes never align with the frame length; 23 spans three boundaries
        let sizes = [3, 23, 1, 0, 5, 11, 2, 30, 9, 4, 13];
        let mut output = Vec::new();
        let mut offset = 0;
        let mut i = 0;
        while offset < input.len() {
            let size = sizes[i % sizes.len()].min(input.len() - offset);
            let emitted = assembler.push(&input[offset..offset + size], |frame| {
                assert_eq!(frame.len(), frame_len);
                output.extend_from_slice(frame);
            });
            if size == 23 {
                assert!(emitted >= 3);
            }
            offset += size;
            i += 1;
        }

        let complete = input.len() / frame_len * frame_len;
        assert_eq!(output, input[..complete].to_vec());
        assert_eq!(assembler.pending_len(), input.len() - complete);
    }

    #[test]
    fn test_single_push_spans_three_boundaries() {
        let mut assembler = FrameAssembler::<i16>::new(4).unwrap();
        assembler.push(&[0, 1], |_| {});
        let frames = assembler.push_collect(&(2..15).collect::<Vec<i16>>());

        assert_eq!(
            frames,
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9, 10, 11]]
        );
        assert_eq!(assembler.pending_len(), 3);
    }

    #[test]
    fn test_reset_discards_pending() {
        let mut assembler = FrameAssembler::<f64>::new(3).unwrap();
        assembler.push(&[1.0, 2.0], |_| {});
        assembler.reset();
        let frames = assembler.push_collect(&[3.0, 4.0, 5.0]);
        assert_eq!(frames, vec![vec![3.0, 4.0, 5.0]]);
    }
}
