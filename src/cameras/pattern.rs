//! Synthetic frame source for running without a camera

use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::trace;

use crate::camera::FrameSource;
use crate::types::VideoFrame;
use crate::{LinkError, Result};

/// Marker bytes at the start of every synthetic frame
pub const PATTERN_MAGIC: &[u8; 4] = b"RLTP";

/// Produces small synthetic frames at a fixed rate.
///
/// Each frame is `PATTERN_MAGIC`, the big-endian sequence number, then a
/// gradient that shifts with the sequence, so a viewer can spot stalls.
pub struct TestPatternSource {
    fps: f64,
    interval: Interval,
    sequence: u64,
    payload_len: usize,
    limit: Option<u64>,
}

impl TestPatternSource {
    pub fn new(fps: u32, payload_len: usize) -> Result<Self> {
        if fps == 0 {
            return Err(LinkError::config("test pattern fps must be at least 1"));
        }
        let mut interval = interval(Duration::from_secs_f64(1.0 / fps as f64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self { fps: fps as f64, interval, sequence: 0, payload_len, limit: None })
    }

    /// End the stream after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Decode the sequence number of a pattern frame.
    pub fn sequence_of(data: &[u8]) -> Option<u64> {
        let header = data.get(..12)?;
        if &header[..4] != PATTERN_MAGIC {
            return None;
        }
        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&header[4..12]);
        Some(u64::from_be_bytes(sequence))
    }

    fn render(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(12 + self.payload_len);
        data.extend_from_slice(PATTERN_MAGIC);
        data.extend_from_slice(&self.sequence.to_be_bytes());
        data.extend((0..self.payload_len).map(|i| (i as u64).wrapping_add(self.sequence) as u8));
        data
    }
}

#[async_trait::async_trait]
impl FrameSource for TestPatternSource {
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Ok(None);
        }

        self.interval.tick().await;

        let frame = VideoFrame::new(self.render(), self.sequence);
        trace!(sequence = self.sequence, bytes = frame.len(), "Pattern frame");
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn source_fps(&self) -> f64 {
        self.fps
    }
}
