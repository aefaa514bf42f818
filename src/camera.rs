//! Camera traits: the frame producer feeding the relay and still capture

use crate::Result;
use crate::types::{RouteId, VideoFrame};

/// Trait for live video sources
///
/// Sources handle their own pacing: `next_frame` resolves when the next frame
/// exists, the way a capture device hands out buffers.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Get the next frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Capture failed; the relay backs off and retries
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>>;

    /// Nominal production rate in frames per second
    fn source_fps(&self) -> f64;
}

#[async_trait::async_trait]
impl FrameSource for Box<dyn FrameSource> {
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        (**self).next_frame().await
    }

    fn source_fps(&self) -> f64 {
        (**self).source_fps()
    }
}

/// Trait for capturing and persisting a single photo
#[async_trait::async_trait]
pub trait StillCamera: Send + Sync + 'static {
    /// Capture a still for `route` and return the stored file name.
    async fn capture_still(&self, route: &RouteId) -> Result<String>;
}
