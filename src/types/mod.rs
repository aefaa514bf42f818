//! Core types for the teleoperation channel.
//!
//! ## Architecture
//!
//! - [`ControlMessage`] / [`UplinkMessage`] are the structured text-frame payloads
//! - [`VideoFrame`] is the opaque binary payload flowing rover → console
//! - [`MotionPrimitive`] is the unit the actuator understands
//! - [`OpenPath`] / [`RecordedPath`] hold recorded motion with relative offsets
//! - [`DriveConfig`] and [`NotificationSettings`] come from the settings store
//!
//! ## Usage Example
//!
//! ```rust
//! use roverlink::types::{Command, ControlMessage, MotionPrimitive, RouteId};
//!
//! let msg = ControlMessage::from_json(r#"{"command":"left","route_id":3}"#).unwrap();
//! assert_eq!(msg.command, Command::Left);
//! assert_eq!(msg.command.motion(), Some(MotionPrimitive::Left));
//! assert_eq!(msg.route_id, Some(RouteId::from("3")));
//! ```

mod frame;
mod frame_rate;
mod message;
mod motion;
mod path;
mod route;
mod settings;

pub use frame::VideoFrame;
pub use frame_rate::FrameRate;
pub use message::{Command, ControlMessage, Status, UplinkMessage};
pub use motion::{Direction, MotionPrimitive};
pub use path::{OpenPath, PathEntry, RecordedPath};
pub use route::RouteId;
pub use settings::{DriveConfig, DrivePreferences, MaxSpeed, NotificationSettings, OperationMode};
