//! Command router: turns decoded control messages into actuator and
//! recorder actions
//!
//! Every command is validated against the session's route binding and
//! recorder state first. A command that does not fit is rejected and leaves
//! state untouched. Only transport failures propagate out of [`CommandRouter::route`];
//! everything else is reported back to the console and the session keeps going.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::actuator::{Actuator, apply_or_stop, fail_safe_stop};
use crate::camera::StillCamera;
use crate::notify::{FaultNotice, Notifier};
use crate::recorder::RecorderState;
use crate::replay::ReplayOutcome;
use crate::session::Session;
use crate::store::PathStore;
use crate::transport::{CloseCode, TransportHandle};
use crate::types::{Command, ControlMessage, MotionPrimitive, RecordedPath, RouteId, UplinkMessage};
use crate::{LinkError, Result};

/// Collaborators shared by every session on one rover
pub struct CommandRouter {
    actuator: Arc<dyn Actuator>,
    camera: Arc<dyn StillCamera>,
    paths: Arc<dyn PathStore>,
    notifier: Arc<dyn Notifier>,
}

impl CommandRouter {
    pub fn new(
        actuator: Arc<dyn Actuator>,
        camera: Arc<dyn StillCamera>,
        paths: Arc<dyn PathStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { actuator, camera, paths, notifier }
    }

    pub fn actuator(&self) -> &Arc<dyn Actuator> {
        &self.actuator
    }

    /// Handle one inbound message.
    ///
    /// Returns `Err` only when the session's transport failed.
    pub async fn route(&self, message: ControlMessage, session: &mut Session) -> Result<()> {
        let command = message.command;
        debug!(session = %session.id(), %command, route = ?message.route_id, "Routing command");

        match self.dispatch(message, session).await {
            Ok(Some(ack)) => session.acknowledge(ack).await,
            Ok(None) => Ok(()),
            Err(e) if e.is_session_fatal() => Err(e),
            Err(e) => {
                warn!(session = %session.id(), %command, "Command not applied: {}", e);
                self.notify_fault(session, &e).await;
                let failure = UplinkMessage::failure(command, &e);
                if command == Command::TakePhoto {
                    session.handle().send_uplink(&failure).await
                } else {
                    session.acknowledge(failure).await
                }
            }
        }
    }

    async fn dispatch(&self, message: ControlMessage, session: &mut Session) -> Result<Option<UplinkMessage>> {
        let command = message.command;

        // A stop is honoured whatever route it names
        if command != Command::Stop {
            session.bind_route(message.route_id.as_ref())?;
        }
        if command.needs_route() && session.route().is_none() {
            return Err(LinkError::RouteRequired { command: command.to_string() });
        }

        match command {
            Command::Forward | Command::Backward | Command::Left | Command::Right => {
                let primitive = command.motion().unwrap_or(MotionPrimitive::Stop);
                self.drive(primitive, session).await?;
                Ok(None)
            }
            Command::Stop => {
                if let Some(outcome) = session.recorder.cancel_replay().await {
                    info!(session = %session.id(), ?outcome, "Replay ended by stop");
                    self.replay_finished(outcome, session).await?;
                }
                self.drive(MotionPrimitive::Stop, session).await?;
                Ok(None)
            }
            Command::StartRecording => {
                let route = self.bound_route(session, command)?;
                session.recorder.start_recording(route, Instant::now())?;
                info!(session = %session.id(), route = ?session.route(), "Recording started");
                Ok(Some(UplinkMessage::ack(command, "Recording started")))
            }
            Command::StopRecording => match session.recorder.stop_recording() {
                Some(path) => {
                    let entries = path.len();
                    self.persist(path).await?;
                    Ok(Some(UplinkMessage::ack(command, format!("Recording saved ({entries} steps)"))))
                }
                None => Ok(Some(UplinkMessage::ack(command, "Not recording"))),
            },
            Command::ReplayPath => {
                let route = self.bound_route(session, command)?;
                session.recorder.ensure_idle(command.as_str())?;
                let path = match self.paths.load(&route).await? {
                    Some(path) if !path.is_empty() => path,
                    _ => return Err(LinkError::NoRecordedPath { route }),
                };
                let steps = path.len();
                session.recorder.start_replay(path, Arc::clone(&self.actuator), *session.drive())?;
                Ok(Some(UplinkMessage::ack(command, format!("Replaying {steps} steps"))))
            }
            Command::TakePhoto => {
                let route = self.bound_route(session, command)?;
                self.spawn_photo(route, session);
                Ok(None)
            }
        }
    }

    /// Emit a motion primitive and record it if a recording is open.
    async fn drive(&self, primitive: MotionPrimitive, session: &mut Session) -> Result<()> {
        if primitive.is_motion() && session.recorder_state() == RecorderState::Replaying {
            return Err(LinkError::state_conflict(primitive.as_str(), RecorderState::Replaying.to_string()));
        }

        let applied = apply_or_stop(self.actuator.as_ref(), primitive, session.drive()).await;
        let now = Instant::now();
        match applied {
            Ok(()) => {
                session.recorder.record(primitive, now);
                Ok(())
            }
            Err(e) => {
                // The rover was stopped in place of the failed primitive
                if primitive.is_motion() {
                    session.recorder.record(MotionPrimitive::Stop, now);
                }
                Err(e)
            }
        }
    }

    fn bound_route(&self, session: &Session, command: Command) -> Result<RouteId> {
        session.route().cloned().ok_or_else(|| LinkError::RouteRequired { command: command.to_string() })
    }

    /// Store a sealed path. Empty recordings keep whatever was stored before.
    async fn persist(&self, path: RecordedPath) -> Result<()> {
        if path.is_empty() {
            debug!(route = %path.route(), "Empty recording not persisted");
            return Ok(());
        }
        self.paths.save(&path).await?;
        info!(route = %path.route(), entries = path.len(), duration = ?path.duration(), "Path saved");
        Ok(())
    }

    /// Capture a still without holding up the session worker.
    fn spawn_photo(&self, route: RouteId, session: &Session) {
        let camera = Arc::clone(&self.camera);
        let notifier = Arc::clone(&self.notifier);
        let handle: TransportHandle = session.handle().clone();
        let recipient = session.notifications().recipient().map(str::to_string);
        let id = session.id();

        tokio::spawn(async move {
            let reply = match camera.capture_still(&route).await {
                Ok(filename) => UplinkMessage::photo_saved(filename),
                Err(e) => {
                    warn!(session = %id, route = %route, "Photo failed: {}", e);
                    if let Some(email) = recipient
                        && let Some(notice) = FaultNotice::for_error(Some(route.clone()), &e, &email)
                        && let Err(e) = notifier.notify(notice).await
                    {
                        warn!("Fault notice not delivered: {}", e);
                    }
                    UplinkMessage::failure(Command::TakePhoto, &e)
                }
            };
            if let Err(e) = handle.send_uplink(&reply).await {
                debug!(session = %id, "Photo result not delivered: {}", e);
            }
        });
    }

    async fn notify_fault(&self, session: &Session, error: &LinkError) {
        let Some(email) = session.notifications().recipient() else {
            return;
        };
        if let Some(notice) = FaultNotice::for_error(session.route().cloned(), error, email)
            && let Err(e) = self.notifier.notify(notice).await
        {
            warn!(session = %session.id(), "Fault notice not delivered: {}", e);
        }
    }

    /// Report the end of a replay to the console.
    pub async fn replay_finished(&self, outcome: ReplayOutcome, session: &mut Session) -> Result<()> {
        let reply = match outcome {
            ReplayOutcome::Completed { steps } => {
                UplinkMessage::ack(Command::ReplayPath, format!("Replay finished ({steps} steps)"))
            }
            ReplayOutcome::Cancelled { emitted } => {
                UplinkMessage::ack(Command::ReplayPath, format!("Replay cancelled after {emitted} steps"))
            }
            ReplayOutcome::Faulted { error, .. } => {
                self.notify_fault(session, &error).await;
                UplinkMessage::failure(Command::ReplayPath, &error)
            }
        };
        session.acknowledge(reply).await
    }

    /// Force the session to `stop` + idle and close its socket.
    ///
    /// Runs on every exit path; repeated calls do nothing.
    pub async fn teardown(&self, session: &mut Session, code: CloseCode, reason: &str) {
        if !session.begin_teardown() {
            return;
        }

        let sealed = session.recorder.force_idle().await;
        fail_safe_stop(self.actuator.as_ref(), session.drive()).await;

        if let Some(path) = sealed {
            info!(session = %session.id(), route = %path.route(), entries = path.len(), "Recording sealed at disconnect");
            if let Err(e) = self.persist(path).await {
                error!(session = %session.id(), "Interrupted recording lost: {}", e);
            }
        }

        session.handle().close(code, reason).await;
        debug!(session = %session.id(), "Session torn down");
    }
}
