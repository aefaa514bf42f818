//! Motion primitives accepted by the actuator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{LinkError, Result};

/// One atomic drive instruction.
///
/// Primitives carry no duration: a direction stays active until another
/// primitive (or [`MotionPrimitive::Stop`]) supersedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionPrimitive {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl MotionPrimitive {
    /// Wire name of the primitive.
    pub fn as_str(self) -> &'static str {
        match self {
            MotionPrimitive::Forward => "forward",
            MotionPrimitive::Backward => "backward",
            MotionPrimitive::Left => "left",
            MotionPrimitive::Right => "right",
            MotionPrimitive::Stop => "stop",
        }
    }

    /// True for everything except `stop`.
    pub fn is_motion(self) -> bool {
        !matches!(self, MotionPrimitive::Stop)
    }
}

impl fmt::Display for MotionPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MotionPrimitive {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "forward" => Ok(MotionPrimitive::Forward),
            "backward" => Ok(MotionPrimitive::Backward),
            "left" => Ok(MotionPrimitive::Left),
            "right" => Ok(MotionPrimitive::Right),
            "stop" => Ok(MotionPrimitive::Stop),
            other => Err(LinkError::protocol(format!("unknown motion primitive '{other}'"))),
        }
    }
}

/// A drive direction as pressed on the operator console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::Forward, Direction::Backward, Direction::Left, Direction::Right];
}

impl From<Direction> for MotionPrimitive {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => MotionPrimitive::Forward,
            Direction::Backward => MotionPrimitive::Backward,
            Direction::Left => MotionPrimitive::Left,
            Direction::Right => MotionPrimitive::Right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for primitive in [
            MotionPrimitive::Forward,
            MotionPrimitive::Backward,
            MotionPrimitive::Left,
            MotionPrimitive::Right,
            MotionPrimitive::Stop,
        ] {
            assert_eq!(primitive.as_str().parse::<MotionPrimitive>().unwrap(), primitive);
        }
        assert!("sideways".parse::<MotionPrimitive>().is_err());
    }

    #[test]
    fn only_stop_is_not_motion() {
        assert!(!MotionPrimitive::Stop.is_motion());
        for direction in Direction::ALL {
            assert!(MotionPrimitive::from(direction).is_motion());
        }
    }
}
