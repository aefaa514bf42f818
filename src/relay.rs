//! Video relay: pulls frames from the camera and pushes them to whichever
//! session is currently connected

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::camera::FrameSource;
use crate::stream::ThrottleExt;
use crate::transport::{PushOutcome, TransportHandle};
use crate::types::{FrameRate, VideoFrame};

/// Where relayed frames go: the bound session's handle, or nowhere.
pub type VideoSink = watch::Receiver<Option<TransportHandle>>;

/// Result of spawning the relay
pub struct RelayChannels {
    /// Latest frame produced by the source (read by the still camera)
    pub latest: watch::Receiver<Option<Arc<VideoFrame>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Spawns the producer and forwarder tasks of the video relay
///
/// The producer owns the source and publishes every frame on a watch channel.
/// The forwarder follows that channel at the configured rate and hands frames
/// to the current sink without ever waiting on the socket.
pub struct VideoRelay;

impl VideoRelay {
    pub fn spawn<F>(source: F, rate: FrameRate, sink: VideoSink) -> RelayChannels
    where
        F: FrameSource,
    {
        let (frame_tx, frame_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let source_fps = source.source_fps();

        tokio::spawn(Self::producer_task(source, frame_tx, cancel.clone()));
        tokio::spawn(Self::forwarder_task(
            frame_rx.clone(),
            rate.relay_interval(source_fps),
            sink,
            cancel.clone(),
        ));

        RelayChannels { latest: frame_rx, cancel }
    }

    async fn producer_task<F>(
        mut source: F,
        frame_tx: watch::Sender<Option<Arc<VideoFrame>>>,
        cancel: CancellationToken,
    ) where
        F: FrameSource,
    {
        info!(fps = source.source_fps(), "Video producer started");
        let mut frame_count = 0u64;
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Video producer cancelled");
                    break;
                }
                result = source.next_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    frame_count += 1;
                    error_count = 0;
                    trace!(sequence = frame.sequence, bytes = frame.len(), "Frame produced");
                    frame_tx.send_replace(Some(Arc::new(frame)));
                }
                Ok(None) => {
                    info!("Frame source ended after {} frames", frame_count);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Frame source error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many frame source errors, stopping video");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("Video producer ended ({} frames)", frame_count);
    }

    async fn forwarder_task(
        frames: watch::Receiver<Option<Arc<VideoFrame>>>,
        interval: Option<Duration>,
        sink: VideoSink,
        cancel: CancellationToken,
    ) {
        let frames = WatchStream::new(frames).filter_map(|frame| async move { frame });
        let mut frames = match interval {
            Some(interval) => {
                debug!(?interval, "Throttling relayed video");
                frames.throttle(interval).boxed()
            }
            None => frames.boxed(),
        };

        let mut forwarded = 0u64;
        let mut unsent = 0u64;

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = frames.next() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let target = sink.borrow().clone();
            let Some(handle) = target else {
                unsent += 1;
                trace!(sequence = frame.sequence, "No session connected; frame dropped");
                continue;
            };

            match handle.push_frame(VideoFrame::clone(&frame)) {
                PushOutcome::Queued => forwarded += 1,
                PushOutcome::DroppedOldest(sequence) => {
                    forwarded += 1;
                    debug!(dropped = sequence, "Session behind; oldest pending frame dropped");
                }
                PushOutcome::Closed => {
                    unsent += 1;
                    trace!("Session closing; frame dropped");
                }
            }
        }

        if unsent > 0 {
            warn!(forwarded, unsent, "Video relay stopped");
        } else {
            info!(forwarded, "Video relay stopped");
        }
    }
}
