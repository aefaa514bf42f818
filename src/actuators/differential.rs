//! Two-wheel differential drive
//!
//! Maps motion primitives onto left/right wheel outputs:
//!
//! | primitive  | left wheel | right wheel |
//! |------------|------------|-------------|
//! | `forward`  | forward    | forward     |
//! | `backward` | backward   | backward    |
//! | `left`     | backward   | forward     |
//! | `right`    | forward    | backward    |
//! | `stop`     | off        | off         |
//!
//! Turns pivot in place. The duty cycle of every driven wheel is derived from
//! the configured max speed.

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::actuator::Actuator;
use crate::types::{DriveConfig, MotionPrimitive};
use crate::{LinkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    Forward,
    Backward,
    Off,
}

/// Output for a single wheel motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelOutput {
    pub direction: WheelDirection,
    /// PWM duty cycle in percent (0 when off)
    pub duty: u8,
}

impl WheelOutput {
    pub const OFF: WheelOutput = WheelOutput { direction: WheelDirection::Off, duty: 0 };

    fn driven(direction: WheelDirection, duty: u8) -> Self {
        Self { direction, duty }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelPair {
    pub left: WheelOutput,
    pub right: WheelOutput,
}

impl WheelPair {
    pub const STOPPED: WheelPair = WheelPair { left: WheelOutput::OFF, right: WheelOutput::OFF };

    /// Wheel outputs for `primitive` under `drive`.
    pub fn for_primitive(primitive: MotionPrimitive, drive: &DriveConfig) -> Self {
        use WheelDirection::{Backward, Forward};

        let duty = drive.max_speed.duty_percent();
        let pair = |left, right| WheelPair {
            left: WheelOutput::driven(left, duty),
            right: WheelOutput::driven(right, duty),
        };

        match primitive {
            MotionPrimitive::Forward => pair(Forward, Forward),
            MotionPrimitive::Backward => pair(Backward, Backward),
            MotionPrimitive::Left => pair(Backward, Forward),
            MotionPrimitive::Right => pair(Forward, Backward),
            MotionPrimitive::Stop => WheelPair::STOPPED,
        }
    }
}

/// Low-level motor output, e.g. GPIO pins behind an H-bridge.
pub trait WheelDriver: Send + 'static {
    fn set(&mut self, wheels: WheelPair) -> std::io::Result<()>;
}

struct DriveState<W> {
    wheels: W,
    current: WheelPair,
}

/// Actuator for a two-wheel differential rover
pub struct DifferentialActuator<W> {
    state: Mutex<DriveState<W>>,
}

impl<W: WheelDriver> DifferentialActuator<W> {
    pub fn new(wheels: W) -> Self {
        Self { state: Mutex::new(DriveState { wheels, current: WheelPair::STOPPED }) }
    }

    /// Outputs currently applied to the wheels.
    pub fn current(&self) -> WheelPair {
        self.state.lock().current
    }
}

#[async_trait::async_trait]
impl<W: WheelDriver> Actuator for DifferentialActuator<W> {
    async fn apply(&self, primitive: MotionPrimitive, drive: &DriveConfig) -> Result<()> {
        let target = WheelPair::for_primitive(primitive, drive);
        let mut state = self.state.lock();

        if state.current == target {
            trace!(%primitive, "Wheel outputs unchanged");
            return Ok(());
        }

        state.wheels.set(target).map_err(|e| LinkError::actuator(primitive, e.to_string()))?;
        state.current = target;
        debug!(%primitive, duty = target.left.duty, mode = %drive.operation_mode, "Wheels updated");
        Ok(())
    }

    fn name(&self) -> &str {
        "differential"
    }
}
