//! Session gateway: accepts consoles, binds them to the rover and tears
//! them down
//!
//! One rover has one actuator, so at most one session is bound at a time.
//! A second console is either refused (`reject`) or takes over after the
//! bound session has fully torn down (`replace`).

use futures::StreamExt;
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{LinkConfig, SessionPolicy};
use crate::router::CommandRouter;
use crate::session::{Session, SessionContext, SessionEnd, SessionId, run_session};
use crate::settings::SettingsStore;
use crate::transport::{CloseCode, TransportHandle, TransportSession};
use crate::types::{DriveConfig, RouteId};
use crate::{LinkError, Result};

/// How long a refused console gets to acknowledge the close frame
const REFUSAL_GRACE: Duration = Duration::from_secs(1);

/// Identity a console presents in the handshake query (`?route_id=..&user=..`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeParams {
    pub route: Option<RouteId>,
    pub user: Option<String>,
}

impl HandshakeParams {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            if value.trim().is_empty() || value == "null" {
                continue;
            }
            match key.as_ref() {
                "route_id" => params.route = Some(RouteId::new(value)),
                "user" => params.user = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
    ended: watch::Receiver<bool>,
}

/// Accepts connections and owns the rover binding
pub struct Gateway {
    rover_id: String,
    policy: SessionPolicy,
    acknowledge_commands: bool,
    default_drive: DriveConfig,
    video_depth: usize,
    router: Arc<CommandRouter>,
    settings: Arc<dyn SettingsStore>,
    video_sink: watch::Sender<Option<TransportHandle>>,
    active: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
}

impl Gateway {
    /// `video_sink` is the sender side of the channel the video relay follows.
    pub fn new(
        config: &LinkConfig,
        router: Arc<CommandRouter>,
        settings: Arc<dyn SettingsStore>,
        video_sink: watch::Sender<Option<TransportHandle>>,
    ) -> Self {
        Self {
            rover_id: config.server.rover_id.clone(),
            policy: config.server.session_policy,
            acknowledge_commands: config.server.acknowledge_commands,
            default_drive: config.drive,
            video_depth: config.video.queue_depth,
            router,
            settings,
            video_sink,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Id of the currently bound session, if any.
    pub async fn active_session(&self) -> Option<SessionId> {
        let active = self.active.lock().await;
        active.as_ref().filter(|a| !*a.ended.borrow()).map(|a| a.id)
    }

    /// Accept connections until shutdown.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| LinkError::transport_with_source("listener has no address", Box::new(e)))?;
        info!(rover = %self.rover_id, %local, "Gateway listening");

        loop {
            let (stream, peer) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        continue;
                    }
                },
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!(%peer, "TCP_NODELAY not set: {}", e);
            }
            let gateway = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = gateway.handle_connection(stream, peer.to_string()).await {
                    warn!(%peer, "Connection ended with error: {}", e);
                }
            });
        }

        self.shutdown().await;
        info!(rover = %self.rover_id, "Gateway stopped");
        Ok(())
    }

    /// Cancel the bound session (if any) and wait for its teardown.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let ended = self.active.lock().await.as_ref().map(|a| (a.cancel.clone(), a.ended.clone()));
        if let Some((cancel, mut ended)) = ended {
            cancel.cancel();
            let _ = ended.wait_for(|done| *done).await;
        }
    }

    /// Run one connection from websocket handshake to session teardown.
    pub async fn handle_connection<S>(&self, stream: S, peer: String) -> Result<Option<SessionEnd>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut query = None;
        let capture_query =
            |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
                query = request.uri().query().map(str::to_string);
                Ok(response)
            };
        let ws = tokio_tungstenite::accept_hdr_async(stream, capture_query).await?;
        let params = HandshakeParams::from_query(query.as_deref());
        debug!(%peer, ?params, "Websocket handshake complete");

        let (id, cancel, ended_tx) = match self.admit().await {
            Ok(admitted) => admitted,
            Err(e) => {
                info!(%peer, "Console refused: {}", e);
                refuse(ws).await;
                return Ok(None);
            }
        };

        let context = self.session_context(id, params).await;
        let transport = TransportSession::spawn(ws, self.video_depth);
        let session = Session::new(context, transport.handle.clone());

        self.video_sink.send_replace(Some(transport.handle));
        let end = run_session(session, transport.reader, Arc::clone(&self.router), cancel).await;
        self.video_sink.send_replace(None);

        ended_tx.send_replace(true);
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
        }
        debug!(session = %id, %peer, "Rover binding released");
        Ok(Some(end))
    }

    async fn admit(&self) -> Result<(SessionId, CancellationToken, watch::Sender<bool>)> {
        if self.cancel.is_cancelled() {
            return Err(LinkError::transport("gateway shutting down"));
        }

        let mut active = self.active.lock().await;
        let bound = active
            .as_ref()
            .filter(|current| !*current.ended.borrow())
            .map(|current| (current.id, current.cancel.clone(), current.ended.clone()));

        if let Some((bound_id, bound_cancel, mut bound_ended)) = bound {
            match self.policy {
                SessionPolicy::Reject => {
                    return Err(LinkError::SessionBusy { rover: self.rover_id.clone() });
                }
                SessionPolicy::Replace => {
                    info!(session = %bound_id, "Replacing bound session");
                    bound_cancel.cancel();
                    let _ = bound_ended.wait_for(|done| *done).await;
                }
            }
        }

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = self.cancel.child_token();
        let (ended_tx, ended) = watch::channel(false);
        *active = Some(ActiveSession { id, cancel: cancel.clone(), ended });
        Ok((id, cancel, ended_tx))
    }

    async fn session_context(&self, id: SessionId, params: HandshakeParams) -> SessionContext {
        let user = params.user.as_deref();
        let drive = match self.settings.rover_settings(user).await {
            Ok(Some(preferences)) => preferences.over(self.default_drive),
            Ok(None) => self.default_drive,
            Err(e) => {
                warn!(session = %id, "Rover settings unavailable, using defaults: {}", e);
                self.default_drive
            }
        };
        let notifications = match self.settings.notification_settings(user).await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                warn!(session = %id, "Notification settings unavailable: {}", e);
                Default::default()
            }
        };
        debug!(session = %id, mode = %drive.operation_mode, max_speed = drive.max_speed.kmh(), "Session configured");

        SessionContext {
            id,
            route: params.route,
            user: params.user,
            drive,
            notifications,
            acknowledge_commands: self.acknowledge_commands,
        }
    }
}

/// Close a socket that was not admitted with 1008 "rover busy".
async fn refuse<S>(mut ws: WebSocketStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = CloseFrame { code: CloseCode::Policy, reason: Cow::Borrowed("rover busy") };
    if let Err(e) = ws.close(Some(frame)).await {
        debug!("Refusal close frame not delivered: {}", e);
        return;
    }
    let _ = tokio::time::timeout(REFUSAL_GRACE, async { while let Some(Ok(_)) = ws.next().await {} }).await;
}
