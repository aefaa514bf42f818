//! Video frame type

use std::sync::Arc;
use tokio::time::Instant;

/// One opaque video frame as produced by the camera.
///
/// The payload is forwarded to the console unmodified. `sequence` increases
/// monotonically per source so receivers can detect drops.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Encoded frame bytes (zero-copy via Arc)
    pub data: Arc<[u8]>,

    /// Monotonic frame counter
    pub sequence: u64,

    /// When the source produced the frame
    pub captured_at: Instant,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, sequence: u64) -> Self {
        Self { data: data.into(), sequence, captured_at: Instant::now() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
