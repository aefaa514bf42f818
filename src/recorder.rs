//! Path recorder/replayer state machine
//!
//! ```text
//!        start_recording            replay_path
//!   Idle ───────────────► Recording     Idle ─────────────► Replaying
//!    ▲                       │           ▲                      │
//!    └───── stop_recording ──┘           └─ finished / cancel ──┘
//! ```
//!
//! `Recording` and `Replaying` never follow each other directly. Conflicting
//! transitions are rejected, never queued.

use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

use crate::actuator::Actuator;
use crate::replay::{ReplayDriver, ReplayHandle, ReplayOutcome};
use crate::types::{DriveConfig, MotionPrimitive, OpenPath, RecordedPath, RouteId};
use crate::{LinkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Replaying,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => f.write_str("idle"),
            RecorderState::Recording => f.write_str("recording"),
            RecorderState::Replaying => f.write_str("replaying"),
        }
    }
}

enum Mode {
    Idle,
    Recording(OpenPath),
    Replaying(ReplayHandle),
}

/// Session-owned recorder. Holds at most one open path or one running replay.
pub struct PathRecorder {
    mode: Mode,
}

impl Default for PathRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRecorder {
    pub fn new() -> Self {
        Self { mode: Mode::Idle }
    }

    pub fn state(&self) -> RecorderState {
        match self.mode {
            Mode::Idle => RecorderState::Idle,
            Mode::Recording(_) => RecorderState::Recording,
            Mode::Replaying(_) => RecorderState::Replaying,
        }
    }

    /// Entries recorded so far, when recording.
    pub fn recorded_len(&self) -> Option<usize> {
        match &self.mode {
            Mode::Recording(path) => Some(path.len()),
            _ => None,
        }
    }

    /// Fail with a state conflict unless idle.
    pub fn ensure_idle(&self, command: &str) -> Result<()> {
        match self.state() {
            RecorderState::Idle => Ok(()),
            state => Err(LinkError::state_conflict(command, state.to_string())),
        }
    }

    /// Open a new path for `route`, starting its clock at `now`.
    pub fn start_recording(&mut self, route: RouteId, now: Instant) -> Result<()> {
        self.ensure_idle("start_recording")?;
        debug!(route = %route, "Recorder: idle -> recording");
        self.mode = Mode::Recording(OpenPath::start(route, now));
        Ok(())
    }

    /// Append `primitive` if recording. Returns whether it was recorded.
    pub fn record(&mut self, primitive: MotionPrimitive, now: Instant) -> bool {
        match &mut self.mode {
            Mode::Recording(path) => {
                path.append(primitive, now);
                true
            }
            _ => false,
        }
    }

    /// Seal the open path and go idle. A no-op (returning `None`) unless recording.
    pub fn stop_recording(&mut self) -> Option<RecordedPath> {
        if !matches!(self.mode, Mode::Recording(_)) {
            return None;
        }
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Recording(path) => {
                let sealed = path.seal();
                debug!(route = %sealed.route(), entries = sealed.len(), "Recorder: recording -> idle");
                Some(sealed)
            }
            _ => None,
        }
    }

    /// Start replaying `path` through `actuator`.
    pub fn start_replay(
        &mut self,
        path: RecordedPath,
        actuator: Arc<dyn Actuator>,
        drive: DriveConfig,
    ) -> Result<()> {
        self.ensure_idle("replay_path")?;
        if path.is_empty() {
            return Err(LinkError::NoRecordedPath { route: path.route().clone() });
        }
        debug!(route = %path.route(), steps = path.len(), "Recorder: idle -> replaying");
        self.mode = Mode::Replaying(ReplayDriver::spawn(path, actuator, drive));
        Ok(())
    }

    /// Resolves when the running replay ends, leaving the recorder idle.
    ///
    /// Pending forever when not replaying, so it can sit in a `select!`.
    /// Cancellation safe.
    pub async fn replay_done(&mut self) -> ReplayOutcome {
        let outcome = match &mut self.mode {
            Mode::Replaying(handle) => handle.join().await,
            _ => std::future::pending().await,
        };
        self.mode = Mode::Idle;
        debug!("Recorder: replaying -> idle");
        outcome
    }

    /// Cancel a running replay and wait for its final `stop`.
    pub async fn cancel_replay(&mut self) -> Option<ReplayOutcome> {
        let Mode::Replaying(handle) = &mut self.mode else {
            return None;
        };
        handle.cancel();
        let outcome = handle.join().await;
        self.mode = Mode::Idle;
        debug!("Recorder: replay cancelled -> idle");
        Some(outcome)
    }

    /// Force the recorder idle from any state.
    ///
    /// A running replay is cancelled and an open recording is sealed and
    /// returned rather than discarded. Calling it again is a no-op.
    pub async fn force_idle(&mut self) -> Option<RecordedPath> {
        self.cancel_replay().await;
        self.stop_recording()
    }
}
