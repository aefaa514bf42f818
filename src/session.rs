//! Per-connection session state and the worker that drives it

use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::recorder::{PathRecorder, RecorderState};
use crate::router::CommandRouter;
use crate::transport::{CloseCode, Inbound, TransportHandle, TransportReader};
use crate::types::{DriveConfig, NotificationSettings, RouteId, UplinkMessage};
use crate::{LinkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the gateway knows about a connection when it is accepted
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: SessionId,
    pub route: Option<RouteId>,
    pub user: Option<String>,
    pub drive: DriveConfig,
    pub notifications: NotificationSettings,
    pub acknowledge_commands: bool,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The console closed the socket
    PeerClosed,
    /// Reading or writing the socket failed
    TransportFailed,
    /// The gateway cancelled it (shutdown or replaced by a newer session)
    Cancelled,
}

/// One live connection: its route binding, drive configuration and recorder.
///
/// Owned by the session worker for the lifetime of the connection.
pub struct Session {
    id: SessionId,
    route: Option<RouteId>,
    user: Option<String>,
    drive: DriveConfig,
    notifications: NotificationSettings,
    acknowledge_commands: bool,
    pub(crate) recorder: PathRecorder,
    handle: TransportHandle,
    torn_down: bool,
}

impl Session {
    pub fn new(context: SessionContext, handle: TransportHandle) -> Self {
        Self {
            id: context.id,
            route: context.route,
            user: context.user,
            drive: context.drive,
            notifications: context.notifications,
            acknowledge_commands: context.acknowledge_commands,
            recorder: PathRecorder::new(),
            handle,
            torn_down: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn route(&self) -> Option<&RouteId> {
        self.route.as_ref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn drive(&self) -> &DriveConfig {
        &self.drive
    }

    pub fn notifications(&self) -> &NotificationSettings {
        &self.notifications
    }

    pub fn acknowledges_commands(&self) -> bool {
        self.acknowledge_commands
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn handle(&self) -> &TransportHandle {
        &self.handle
    }

    /// Bind the session to `received` if it is not bound yet.
    ///
    /// Fails with [`LinkError::RouteMismatch`] when bound to a different route.
    pub fn bind_route(&mut self, received: Option<&RouteId>) -> Result<()> {
        let Some(received) = received else {
            return Ok(());
        };
        match &self.route {
            None => {
                info!(session = %self.id, route = %received, "Session bound to route");
                self.route = Some(received.clone());
                Ok(())
            }
            Some(bound) if bound == received => Ok(()),
            Some(bound) => Err(LinkError::RouteMismatch { bound: bound.clone(), received: received.clone() }),
        }
    }

    /// Send an acknowledgement if this session asked for them.
    pub(crate) async fn acknowledge(&self, message: UplinkMessage) -> Result<()> {
        if self.acknowledge_commands {
            self.handle.send_uplink(&message).await?;
        }
        Ok(())
    }

    /// Marks the session torn down; returns `false` if it already was.
    pub(crate) fn begin_teardown(&mut self) -> bool {
        !std::mem::replace(&mut self.torn_down, true)
    }
}

/// Session worker: processes inbound messages in receipt order until the
/// connection ends, then tears the session down.
///
/// Replay completion is observed here too, so the recorder is only ever
/// touched by this one task.
pub async fn run_session<S>(
    mut session: Session,
    mut reader: TransportReader<S>,
    router: Arc<CommandRouter>,
    cancel: CancellationToken,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    info!(session = %session.id(), route = ?session.route(), user = ?session.user(), "Session started");
    let writer_closed = reader.closed_token();

    let end = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break SessionEnd::Cancelled,
            _ = writer_closed.cancelled() => break SessionEnd::TransportFailed,
            outcome = session.recorder.replay_done() => {
                if let Err(e) = router.replay_finished(outcome, &mut session).await {
                    warn!(session = %session.id(), "Session transport failed: {}", e);
                    break SessionEnd::TransportFailed;
                }
            }
            inbound = reader.next() => {
                let frame = match inbound {
                    None => break SessionEnd::PeerClosed,
                    Some(Err(e)) => {
                        warn!(session = %session.id(), "Session transport failed: {}", e);
                        break SessionEnd::TransportFailed;
                    }
                    Some(Ok(frame)) => frame,
                };

                let handled = match Inbound::from(frame) {
                    Inbound::Control(message) => router.route(message, &mut session).await,
                    Inbound::Malformed(error) => {
                        warn!(session = %session.id(), "Dropping malformed message: {}", error);
                        session.acknowledge(UplinkMessage::invalid(&error)).await
                    }
                    Inbound::UnexpectedBinary(len) => {
                        debug!(session = %session.id(), len, "Dropping binary frame from console");
                        Ok(())
                    }
                };

                if let Err(e) = handled {
                    warn!(session = %session.id(), "Session transport failed: {}", e);
                    break SessionEnd::TransportFailed;
                }
            }
        }
    };

    let (code, reason) = match end {
        SessionEnd::Cancelled => (CloseCode::Away, "session ended by rover"),
        SessionEnd::PeerClosed | SessionEnd::TransportFailed => (CloseCode::Normal, "bye"),
    };
    router.teardown(&mut session, code, reason).await;
    info!(session = %session.id(), ?end, "Session ended");
    end
}
