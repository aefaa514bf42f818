//! Operator console client
//!
//! Turns UI button edges into intents and intents into control messages, and
//! splits the rover's uplink into video frames and structured replies.
//!
//! ```rust,no_run
//! use roverlink::console::{ButtonEdge, ConsoleEvent, OperatorConsole};
//! use roverlink::types::{Direction, RouteId};
//!
//! # async fn drive() -> roverlink::Result<()> {
//! let (console, mut events) =
//!     OperatorConsole::connect("ws://rover.local:8888/", Some(RouteId::from("7"))).await?;
//!
//! console.edge(ButtonEdge::Press(Direction::Forward)).await?;
//! console.edge(ButtonEdge::Release(Direction::Forward)).await?;
//!
//! while let Some(event) = events.next().await {
//!     if let ConsoleEvent::Uplink(reply) = event {
//!         println!("{} -> {:?}", reply.command, reply.status);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use std::sync::Arc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::transport::{CloseCode, TransportHandle, TransportReader, TransportSession, WireFrame};
use crate::types::{Command, ControlMessage, Direction, RouteId, Status, UplinkMessage};
use crate::{LinkError, Result};

/// Frames a console lets queue before dropping the oldest (console → rover
/// carries no video, so this only bounds memory).
const CONSOLE_VIDEO_DEPTH: usize = 1;

/// A physical or on-screen button edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    /// Mouse down / touch start
    Press(Direction),
    /// Mouse up / touch end
    Release(Direction),
    /// Pointer left the button while held
    Leave(Direction),
}

/// What the operator wants the rover to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Drive(Direction),
    Halt,
    StartRecording,
    StopRecording,
    ReplayPath,
    TakePhoto,
}

impl Intent {
    pub fn command(self) -> Command {
        match self {
            Intent::Drive(Direction::Forward) => Command::Forward,
            Intent::Drive(Direction::Backward) => Command::Backward,
            Intent::Drive(Direction::Left) => Command::Left,
            Intent::Drive(Direction::Right) => Command::Right,
            Intent::Halt => Command::Stop,
            Intent::StartRecording => Command::StartRecording,
            Intent::StopRecording => Command::StopRecording,
            Intent::ReplayPath => Command::ReplayPath,
            Intent::TakePhoto => Command::TakePhoto,
        }
    }
}

/// Edge-to-intent mapping.
///
/// A press drives, a release or leave halts. Release and leave both fire
/// when the pointer is lifted off a button; only the first one halts.
#[derive(Debug, Default)]
pub struct EdgeTracker {
    held: Option<Direction>,
}

impl EdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> Option<Direction> {
        self.held
    }

    pub fn on_edge(&mut self, edge: ButtonEdge) -> Option<Intent> {
        match edge {
            ButtonEdge::Press(direction) => {
                self.held = Some(direction);
                Some(Intent::Drive(direction))
            }
            ButtonEdge::Release(_) | ButtonEdge::Leave(_) => self.held.take().map(|_| Intent::Halt),
        }
    }

    /// Halt owed for a button still held when the console goes away.
    pub fn finish(&mut self) -> Option<Intent> {
        self.held.take().map(|_| Intent::Halt)
    }
}

/// Something the rover sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Video(Vec<u8>),
    Uplink(UplinkMessage),
    /// Text the console could not decode
    Garbled(String),
    /// The connection ended; carries the rover's close frame if it sent one
    Closed { code: Option<CloseCode>, reason: String },
}

/// Entry point for console connections
pub struct OperatorConsole;

impl OperatorConsole {
    /// Connect to a rover at `url` (`ws://host:port/`), presenting `route`
    /// in the handshake.
    pub async fn connect(
        url: &str,
        route: Option<RouteId>,
    ) -> Result<(ConsoleHandle, ConsoleEvents<MaybeTlsStream<TcpStream>>)> {
        Self::connect_as(url, route, None).await
    }

    /// Like [`connect`](Self::connect), also naming the operator so the
    /// rover can apply their settings.
    pub async fn connect_as(
        url: &str,
        route: Option<RouteId>,
        user: Option<&str>,
    ) -> Result<(ConsoleHandle, ConsoleEvents<MaybeTlsStream<TcpStream>>)> {
        let mut target =
            Url::parse(url).map_err(|e| LinkError::config(format!("invalid rover url {url}: {e}")))?;
        if route.is_some() || user.is_some() {
            let mut query = target.query_pairs_mut();
            if let Some(route) = &route {
                query.append_pair("route_id", route.as_str());
            }
            if let Some(user) = user {
                query.append_pair("user", user);
            }
        }

        let (ws, response) = tokio_tungstenite::connect_async(target.as_str()).await?;
        info!(url, status = %response.status(), "Console connected");
        Ok(Self::attach(ws, route))
    }

    /// Run a console over an already upgraded websocket.
    pub fn attach<S>(ws: WebSocketStream<S>, route: Option<RouteId>) -> (ConsoleHandle, ConsoleEvents<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let transport = TransportSession::spawn(ws, CONSOLE_VIDEO_DEPTH);
        let state = Arc::new(Mutex::new(ConsoleState::default()));
        let handle = ConsoleHandle { transport: transport.handle, route, state: Arc::clone(&state) };
        (handle, ConsoleEvents { reader: transport.reader, state, finished: false })
    }
}

#[derive(Debug, Default)]
struct ConsoleState {
    edges: EdgeTracker,
    /// Whether the rover last confirmed an open recording
    recording: bool,
}

impl ConsoleState {
    fn observe(&mut self, reply: &UplinkMessage) {
        match (reply.command.as_str(), reply.status) {
            ("start_recording", Status::Ok) => self.recording = true,
            ("stop_recording", _) => self.recording = false,
            _ => {}
        }
    }
}

/// Sending side of a console
pub struct ConsoleHandle {
    transport: TransportHandle,
    route: Option<RouteId>,
    state: Arc<Mutex<ConsoleState>>,
}

impl ConsoleHandle {
    pub fn route(&self) -> Option<&RouteId> {
        self.route.as_ref()
    }

    /// Send one intent as a control message.
    pub async fn send(&self, intent: Intent) -> Result<()> {
        let message = ControlMessage::new(intent.command(), self.route.clone());
        debug!(command = %message.command, "Console sending");
        self.transport.send_downlink(&message).await
    }

    /// Feed a button edge; sends the resulting intent, if any.
    pub async fn edge(&self, edge: ButtonEdge) -> Result<Option<Intent>> {
        let intent = self.state.lock().edges.on_edge(edge);
        if let Some(intent) = intent {
            self.send(intent).await?;
        }
        Ok(intent)
    }

    /// Whether the rover has confirmed a recording in progress. Follows the
    /// replies read through [`ConsoleEvents`].
    pub fn recording(&self) -> bool {
        self.state.lock().recording
    }

    /// Press the record button: stops a confirmed recording, otherwise starts
    /// one. Returns the intent that was sent.
    pub async fn toggle_recording(&self) -> Result<Intent> {
        let intent = if self.recording() { Intent::StopRecording } else { Intent::StartRecording };
        self.send(intent).await?;
        Ok(intent)
    }

    pub async fn replay(&self) -> Result<()> {
        self.send(Intent::ReplayPath).await
    }

    pub async fn take_photo(&self) -> Result<()> {
        self.send(Intent::TakePhoto).await
    }

    /// Release any held button, then close the connection.
    pub async fn close(&self) {
        let owed = self.state.lock().edges.finish();
        if let Some(intent) = owed
            && let Err(e) = self.send(intent).await
        {
            warn!("Final halt not sent: {}", e);
        }
        self.transport.close(CloseCode::Normal, "console closed").await;
    }
}

/// Receiving side of a console
pub struct ConsoleEvents<S> {
    reader: TransportReader<S>,
    state: Arc<Mutex<ConsoleState>>,
    finished: bool,
}

impl<S> ConsoleEvents<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Next event. Yields [`ConsoleEvent::Closed`] once, then `None`.
    pub async fn next(&mut self) -> Option<ConsoleEvent> {
        if self.finished {
            return None;
        }

        match self.reader.next().await {
            Some(Ok(WireFrame::Binary(bytes))) => Some(ConsoleEvent::Video(bytes)),
            Some(Ok(WireFrame::Text(text))) => Some(match UplinkMessage::from_json(&text) {
                Ok(message) => {
                    self.state.lock().observe(&message);
                    ConsoleEvent::Uplink(message)
                }
                Err(_) => ConsoleEvent::Garbled(text),
            }),
            Some(Err(e)) => {
                self.finished = true;
                Some(ConsoleEvent::Closed { code: None, reason: e.to_string() })
            }
            None => {
                self.finished = true;
                let (code, reason) = match self.reader.peer_close() {
                    Some((code, reason)) => (Some(code), reason.to_string()),
                    None => (None, String::new()),
                };
                Some(ConsoleEvent::Closed { code, reason })
            }
        }
    }

    /// Next structured reply, skipping video.
    pub async fn next_uplink(&mut self) -> Option<UplinkMessage> {
        loop {
            match self.next().await? {
                ConsoleEvent::Uplink(message) => return Some(message),
                ConsoleEvent::Closed { .. } => return None,
                ConsoleEvent::Video(_) | ConsoleEvent::Garbled(_) => {}
            }
        }
    }
}
