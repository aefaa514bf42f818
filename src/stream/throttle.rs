//! Stream throttling utilities

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Throttle the stream to emit at most once per interval
    ///
    /// Uses "latest-wins" semantics - if multiple items arrive
    /// during an interval, only the latest is emitted.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        finished: bool,
    }
}

impl<S: Stream> Throttle<S> {
    /// Create a new throttled stream
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        // Don't burst after a quiet period
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, finished: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything ready, keeping only the latest
        while !*this.finished {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.finished = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_none() {
            // The inner stream registered the waker when it returned Pending
            return if *this.finished { Poll::Ready(None) } else { Poll::Pending };
        }

        ready!(this.interval.poll_tick(cx));
        Poll::Ready(this.pending.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    #[tokio::test(start_paused = true)]
    async fn keeps_latest_item_per_interval() {
        let (tx, rx) = mpsc::channel(16);
        let mut throttled = ReceiverStream::new(rx).throttle(Duration::from_millis(100));

        tx.send(1).await.unwrap();
        assert_eq!(throttled.next().await, Some(1));

        for n in 2..=5 {
            tx.send(n).await.unwrap();
        }
        assert_eq!(throttled.next().await, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_source_does_not_end_stream() {
        let (tx, rx) = mpsc::channel(4);
        let mut throttled = ReceiverStream::new(rx).throttle(Duration::from_millis(10));

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            tx.send("late").await.unwrap();
        });

        assert_eq!(throttled.next().await, Some("late"));
        producer.await.unwrap();
        assert_eq!(throttled.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_item_is_flushed_when_source_ends() {
        let items = futures::stream::iter(vec![1, 2, 3]);
        let collected: Vec<_> = items.throttle(Duration::from_millis(50)).collect().await;
        assert_eq!(collected, vec![3]);
    }
}
