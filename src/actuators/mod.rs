//! Actuator implementations

pub mod differential;
pub mod simulated;

pub use differential::{DifferentialActuator, WheelDirection, WheelDriver, WheelOutput, WheelPair};
pub use simulated::{ActuatorEvent, SimulatedActuator};
