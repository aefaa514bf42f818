//! Error types for the teleoperation channel.
//!
//! Every fallible operation in roverlink returns [`LinkError`]. The variants
//! follow how a failure propagates through a live session:
//!
//! ## Error Categories
//!
//! - **Protocol Errors**: malformed inbound messages; dropped, session stays open
//! - **State Conflicts**: a command that does not fit the recorder state; rejected
//! - **Transport Errors**: read/write failures on the socket; fatal to the session
//! - **Actuator Faults**: the drive sink refused a primitive; a `stop` follows
//! - **Camera / Store Errors**: collaborator failures, reported back to the console
//! - **Config / File Errors**: startup problems in the daemon
//!
//! ## Session Fatality
//!
//! Only transport-level failures end a session. Everything else is reported and
//! the worker keeps reading:
//!
//! ```rust
//! use roverlink::LinkError;
//!
//! let conflict = LinkError::state_conflict("replay_path", "replaying");
//! assert!(!conflict.is_session_fatal());
//! assert_eq!(conflict.status(), "rejected");
//!
//! let broken = LinkError::transport("connection reset");
//! assert!(broken.is_session_fatal());
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{MotionPrimitive, RouteId};

/// Result type alias for roverlink operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for roverlink operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Malformed message: {details}")]
    Protocol { details: String },

    #[error("Command '{command}' rejected while {state}")]
    StateConflict { command: String, state: String },

    #[error("Route ID not provided for '{command}'")]
    RouteRequired { command: String },

    #[error("Route mismatch: session is bound to {bound}, message names {received}")]
    RouteMismatch { bound: RouteId, received: RouteId },

    #[error("No recorded path for route {route}")]
    NoRecordedPath { route: RouteId },

    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Actuator rejected '{primitive}': {reason}")]
    Actuator { primitive: MotionPrimitive, reason: String },

    #[error("Camera failure: {reason}")]
    Camera { reason: String },

    #[error("Path store failure for route {route}: {details}")]
    Store { route: RouteId, details: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rover '{rover}' is already bound to another session")]
    SessionBusy { rover: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl LinkError {
    /// Returns whether this error must terminate the session it occurred in.
    ///
    /// Local, recoverable conditions (malformed messages, rejected transitions,
    /// collaborator faults) never do; transport failures always do.
    pub fn is_session_fatal(&self) -> bool {
        match self {
            LinkError::Transport { .. } => true,
            LinkError::Protocol { .. } => false,
            LinkError::StateConflict { .. } => false,
            LinkError::RouteRequired { .. } => false,
            LinkError::RouteMismatch { .. } => false,
            LinkError::NoRecordedPath { .. } => false,
            LinkError::Actuator { .. } => false,
            LinkError::Camera { .. } => false,
            LinkError::Store { .. } => false,
            LinkError::Config { .. } => false,
            LinkError::File { .. } => false,
            LinkError::SessionBusy { .. } => false,
            LinkError::Timeout { .. } => false,
        }
    }

    /// Status label used when this error is acknowledged to the console.
    ///
    /// Commands refused because of the current state are `"rejected"`; anything
    /// that was attempted and failed is `"error"`.
    pub fn status(&self) -> &'static str {
        match self {
            LinkError::StateConflict { .. }
            | LinkError::RouteMismatch { .. }
            | LinkError::NoRecordedPath { .. }
            | LinkError::SessionBusy { .. } => "rejected",
            _ => "error",
        }
    }

    /// Helper constructor for malformed inbound payloads.
    pub fn protocol(details: impl Into<String>) -> Self {
        LinkError::Protocol { details: details.into() }
    }

    /// Helper constructor for rejected state transitions.
    pub fn state_conflict(command: impl Into<String>, state: impl Into<String>) -> Self {
        LinkError::StateConflict { command: command.into(), state: state.into() }
    }

    /// Helper constructor for transport failures.
    pub fn transport(reason: impl Into<String>) -> Self {
        LinkError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport failures with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for actuator faults.
    pub fn actuator(primitive: MotionPrimitive, reason: impl Into<String>) -> Self {
        LinkError::Actuator { primitive, reason: reason.into() }
    }

    /// Helper constructor for camera failures.
    pub fn camera(reason: impl Into<String>) -> Self {
        LinkError::Camera { reason: reason.into() }
    }

    /// Helper constructor for path store failures.
    pub fn store(route: RouteId, details: impl Into<String>) -> Self {
        LinkError::Store { route, details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        LinkError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        LinkError::File { path, source }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for LinkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        LinkError::transport_with_source("websocket error", Box::new(err))
    }
}
