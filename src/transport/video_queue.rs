//! Bounded per-session video queue that drops the oldest frame when full

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

use crate::types::VideoFrame;

/// Result of offering a frame to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full; the frame with this sequence number was discarded
    DroppedOldest(u64),
    /// The session is gone; the frame was discarded
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    frames: VecDeque<VideoFrame>,
    closed: bool,
    dropped: u64,
}

/// Frames waiting for the session writer.
///
/// `push` never blocks, so a slow socket can never stall the camera or the
/// control path; it only costs the oldest pending frames.
#[derive(Debug)]
pub struct VideoQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    depth: usize,
}

impl VideoQueue {
    pub fn new(depth: usize) -> Self {
        Self { state: Mutex::new(QueueState::default()), notify: Notify::new(), depth: depth.max(1) }
    }

    pub fn push(&self, frame: VideoFrame) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }
            let outcome = if state.frames.len() >= self.depth {
                state.dropped += 1;
                state
                    .frames
                    .pop_front()
                    .map(|old| PushOutcome::DroppedOldest(old.sequence))
                    .unwrap_or(PushOutcome::Queued)
            } else {
                PushOutcome::Queued
            };
            state.frames.push_back(frame);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Wait for the next frame. Returns `None` once the queue is closed;
    /// frames still pending at that point are discarded.
    pub async fn pop(&self) -> Option<VideoFrame> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.frames.clear();
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn frame(sequence: u64) -> VideoFrame {
        VideoFrame::new(vec![sequence as u8; 4], sequence)
    }

    #[test]
    fn full_queue_drops_oldest() {
        let queue = VideoQueue::new(2);
        assert_eq!(queue.push(frame(1)), PushOutcome::Queued);
        assert_eq!(queue.push(frame(2)), PushOutcome::Queued);
        assert_eq!(queue.push(frame(3)), PushOutcome::DroppedOldest(1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
    }

    #[tokio::test]
    async fn pop_preserves_production_order() {
        let queue = VideoQueue::new(8);
        for seq in 0..5 {
            queue.push(frame(seq));
        }
        for seq in 0..5 {
            assert_eq!(queue.pop().await.unwrap().sequence, seq);
        }
    }

    #[tokio::test]
    async fn pop_wakes_on_push_and_close() {
        let queue = Arc::new(VideoQueue::new(2));

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await.map(|f| f.sequence) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(frame(7));
        assert_eq!(waiter.await.unwrap(), Some(7));

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();
        assert!(waiter.await.unwrap().is_none());
        assert_eq!(queue.push(frame(8)), PushOutcome::Closed);
    }
}
