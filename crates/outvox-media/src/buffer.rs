//! Bounded FIFO for caller audio that arrives before the AI is ready.
//!
//! The carrier starts streaming the moment the customer answers; the
//! AI session handshake usually finishes a beat later. Frames buffered
//! here are already converted to 16 kHz PCM so the flush on readiness
//! is a plain send loop.

use crate::MediaError;
use std::collections::VecDeque;

/// Default frame cap. At one 20 ms frame per packet this is roughly
/// ten seconds of audio, far beyond any observed handshake delay.
pub const DEFAULT_FRAME_CAP: usize = 512;

#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<Vec<u8>>,
    cap: usize,
}

impl FrameBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            cap,
        }
    }

    /// Appends a frame, rejecting it once the cap is reached.
    pub fn push(&mut self, frame: Vec<u8>) -> Result<(), MediaError> {
        if self.frames.len() >= self.cap {
            return Err(MediaError::BufferOverflow(self.cap));
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Removes and returns all buffered frames in arrival order.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        self.frames.drain(..).collect()
    }

    /// Discards any buffered frames (new stream start).
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_arrival_order() {
        let mut buffer = FrameBuffer::new(8);
        buffer.push(vec![1]).unwrap();
        buffer.push(vec![2]).unwrap();
        buffer.push(vec![3]).unwrap();
        assert_eq!(buffer.drain(), vec![vec![1], vec![2], vec![3]]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn push_fails_at_cap() {
        let mut buffer = FrameBuffer::new(2);
        buffer.push(vec![1]).unwrap();
        buffer.push(vec![2]).unwrap();
        let err = buffer.push(vec![3]).unwrap_err();
        assert!(matches!(err, MediaError::BufferOverflow(2)));
        // The buffered frames survive the rejected push.
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn drain_empties_and_allows_reuse() {
        let mut buffer = FrameBuffer::new(2);
        buffer.push(vec![1]).unwrap();
        assert_eq!(buffer.drain(), vec![vec![1]]);
        buffer.push(vec![2]).unwrap();
        buffer.push(vec![3]).unwrap();
        assert_eq!(buffer.len(), 2);
    }
}
