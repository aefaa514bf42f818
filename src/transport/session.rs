//! One duplex websocket split into a reader and a single-writer task

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use super::codec::{Outbound, WireFrame};
use super::video_queue::{PushOutcome, VideoQueue};
use crate::types::{ControlMessage, UplinkMessage, VideoFrame};
use crate::{LinkError, Result};

/// Pending structured messages per session
const CONTROL_QUEUE_DEPTH: usize = 128;

enum Outgoing {
    Text(String),
    Close { code: CloseCode, reason: String },
}

/// Both halves of a spawned transport session
pub struct TransportSession<S> {
    pub handle: TransportHandle,
    pub reader: TransportReader<S>,
}

impl<S> TransportSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Split `ws` and spawn the writer task that owns the sink.
    ///
    /// All outbound traffic goes through that one task, so text and binary
    /// payloads are written whole and never interleave. Structured messages are
    /// always written before pending video.
    pub fn spawn(ws: WebSocketStream<S>, video_depth: usize) -> Self {
        let (sink, stream) = ws.split();
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
        let video = Arc::new(VideoQueue::new(video_depth));
        let closed = CancellationToken::new();

        tokio::spawn(writer_task(sink, control_rx, Arc::clone(&video), closed.clone()));

        Self {
            handle: TransportHandle { control_tx, video, closed: closed.clone() },
            reader: TransportReader { stream, closed, peer_close: None },
        }
    }
}

/// Cloneable sending side of a session
#[derive(Clone)]
pub struct TransportHandle {
    control_tx: mpsc::Sender<Outgoing>,
    video: Arc<VideoQueue>,
    closed: CancellationToken,
}

impl TransportHandle {
    /// Put one message on the wire.
    ///
    /// Structured messages wait for room in the control queue; frames never
    /// wait and may displace older pending frames.
    pub async fn send(&self, outbound: Outbound) -> Result<()> {
        match outbound {
            Outbound::Uplink(message) => self.send_text(message.to_json()?).await,
            Outbound::Downlink(message) => self.send_text(message.to_json()?).await,
            Outbound::Frame(frame) => match self.push_frame(frame) {
                PushOutcome::Closed => Err(LinkError::transport("session closed")),
                _ => Ok(()),
            },
        }
    }

    pub async fn send_uplink(&self, message: &UplinkMessage) -> Result<()> {
        self.send_text(message.to_json()?).await
    }

    pub async fn send_downlink(&self, message: &ControlMessage) -> Result<()> {
        self.send_text(message.to_json()?).await
    }

    async fn send_text(&self, text: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(LinkError::transport("session closed"));
        }
        self.control_tx
            .send(Outgoing::Text(text))
            .await
            .map_err(|_| LinkError::transport("session writer stopped"))
    }

    /// Offer a video frame without waiting.
    pub fn push_frame(&self, frame: VideoFrame) -> PushOutcome {
        if self.closed.is_cancelled() {
            return PushOutcome::Closed;
        }
        self.video.push(frame)
    }

    /// Ask the writer to flush queued messages, send a close frame and stop.
    pub async fn close(&self, code: CloseCode, reason: impl Into<String>) {
        let request = Outgoing::Close { code, reason: reason.into() };
        if self.control_tx.send(request).await.is_err() {
            self.closed.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the writer has stopped, for whatever reason.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Frames this session dropped because the socket could not keep up.
    pub fn dropped_frames(&self) -> u64 {
        self.video.dropped()
    }
}

/// Receiving side of a session
pub struct TransportReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
    closed: CancellationToken,
    peer_close: Option<(CloseCode, String)>,
}

impl<S> TransportReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Next data frame.
    ///
    /// Returns `None` when the peer closed the connection cleanly and
    /// `Some(Err(..))` for a transport failure. Either way the session is over.
    pub async fn next(&mut self) -> Option<Result<WireFrame>> {
        loop {
            let message = match self.stream.next().await {
                None => return None,
                Some(Ok(message)) => message,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return None,
                Some(Err(e)) => return Some(Err(LinkError::from(e))),
            };

            if let Message::Close(frame) = message {
                debug!(?frame, "Peer sent close frame");
                self.peer_close = frame.map(|f| (f.code, f.reason.into_owned()));
                return None;
            }

            match WireFrame::from_message(message) {
                Some(frame) => return Some(Ok(frame)),
                None => trace!("Skipping non-data frame"),
            }
        }
    }

    /// Code and reason of the peer's close frame, once one has arrived.
    pub fn peer_close(&self) -> Option<(CloseCode, &str)> {
        self.peer_close.as_ref().map(|(code, reason)| (*code, reason.as_str()))
    }

    /// The token cancelled when the writer stops.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

async fn writer_task<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut control_rx: mpsc::Receiver<Outgoing>,
    video: Arc<VideoQueue>,
    closed: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut text_count = 0u64;
    let mut frame_count = 0u64;

    loop {
        let message = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            outgoing = control_rx.recv() => match outgoing {
                Some(Outgoing::Text(text)) => {
                    text_count += 1;
                    WireFrame::Text(text).into_message()
                }
                Some(Outgoing::Close { code, reason }) => {
                    let frame = CloseFrame { code, reason: Cow::Owned(reason) };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        debug!("Close frame not delivered: {}", e);
                    }
                    break;
                }
                None => break,
            },
            frame = video.pop() => match frame {
                Some(frame) => {
                    frame_count += 1;
                    trace!(sequence = frame.sequence, bytes = frame.len(), "Writing video frame");
                    WireFrame::Binary(frame.data.to_vec()).into_message()
                }
                None => break,
            },
        };

        if let Err(e) = sink.send(message).await {
            match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => {
                    debug!("Socket closed under the writer")
                }
                other => error!("Websocket write failed: {}", other),
            }
            break;
        }
    }

    closed.cancel();
    video.close();
    if let Err(e) = sink.close().await {
        debug!("Websocket sink close: {}", e);
    }
    debug!(text_count, frame_count, dropped = video.dropped(), "Session writer stopped");
}
