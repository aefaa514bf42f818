//! Structured control messages carried in text frames
//!
//! Downlink (console → rover):
//!
//! ```text
//! { "command": <cmd>, "route_id": <string|number|null> }
//! ```
//!
//! Uplink (rover → console):
//!
//! ```text
//! { "command": "take_photo", "status": "ok"|"error", "filename": <string> }
//! { "command": <cmd>, "status": "ok"|"rejected"|"error", "message": <string> }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::motion::MotionPrimitive;
use super::route::{self, RouteId};
use crate::{LinkError, Result};

/// Commands a console may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    StartRecording,
    StopRecording,
    ReplayPath,
    TakePhoto,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::Stop,
        Command::StartRecording,
        Command::StopRecording,
        Command::ReplayPath,
        Command::TakePhoto,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Forward => "forward",
            Command::Backward => "backward",
            Command::Left => "left",
            Command::Right => "right",
            Command::Stop => "stop",
            Command::StartRecording => "start_recording",
            Command::StopRecording => "stop_recording",
            Command::ReplayPath => "replay_path",
            Command::TakePhoto => "take_photo",
        }
    }

    /// The motion primitive this command emits, if it is a motion command.
    pub fn motion(self) -> Option<MotionPrimitive> {
        match self {
            Command::Forward => Some(MotionPrimitive::Forward),
            Command::Backward => Some(MotionPrimitive::Backward),
            Command::Left => Some(MotionPrimitive::Left),
            Command::Right => Some(MotionPrimitive::Right),
            Command::Stop => Some(MotionPrimitive::Stop),
            _ => None,
        }
    }

    /// Whether the command only makes sense with a bound route.
    pub fn needs_route(self) -> bool {
        matches!(
            self,
            Command::StartRecording
                | Command::StopRecording
                | Command::ReplayPath
                | Command::TakePhoto
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downlink message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub command: Command,
    #[serde(
        default,
        deserialize_with = "route::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub route_id: Option<RouteId>,
}

impl ControlMessage {
    pub fn new(command: Command, route_id: Option<RouteId>) -> Self {
        Self { command, route_id }
    }

    /// Parse a text frame. Anything that is not a well-formed message is a
    /// [`LinkError::Protocol`].
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LinkError::protocol(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LinkError::protocol(e.to_string()))
    }
}

/// Outcome label carried by every uplink message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Rejected,
    Error,
}

/// One uplink message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkMessage {
    pub command: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UplinkMessage {
    /// Label used when the inbound text could not be decoded at all.
    pub const INVALID_COMMAND: &'static str = "invalid";

    pub fn ack(command: Command, message: impl Into<String>) -> Self {
        Self {
            command: command.as_str().to_string(),
            status: Status::Ok,
            filename: None,
            message: Some(message.into()),
        }
    }

    pub fn photo_saved(filename: impl Into<String>) -> Self {
        Self {
            command: Command::TakePhoto.as_str().to_string(),
            status: Status::Ok,
            filename: Some(filename.into()),
            message: None,
        }
    }

    pub fn failure(command: Command, error: &LinkError) -> Self {
        let status = match error.status() {
            "rejected" => Status::Rejected,
            _ => Status::Error,
        };
        Self {
            command: command.as_str().to_string(),
            status,
            filename: None,
            message: Some(error.to_string()),
        }
    }

    pub fn invalid(error: &LinkError) -> Self {
        Self {
            command: Self::INVALID_COMMAND.to_string(),
            status: Status::Error,
            filename: None,
            message: Some(error.to_string()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LinkError::protocol(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LinkError::protocol(e.to_string()))
    }
}
