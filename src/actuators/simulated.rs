//! In-memory actuator that records what it was told to do

use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::actuator::Actuator;
use crate::types::{DriveConfig, MotionPrimitive};
use crate::{LinkError, Result};

/// One primitive the simulated rover actually acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorEvent {
    pub primitive: MotionPrimitive,
    pub drive: DriveConfig,
    pub at: Instant,
}

#[derive(Debug)]
struct SimState {
    /// Every `apply` call, accepted or not
    calls: Vec<MotionPrimitive>,
    /// Accepted primitives that changed the rover's motion
    events: Vec<ActuatorEvent>,
    current: MotionPrimitive,
    fault_on: Option<MotionPrimitive>,
}

/// Simulated drive sink
///
/// Keeps a motion log for tests and for running the daemon without hardware.
/// A `stop` while already stopped is accepted but not logged as an event,
/// mirroring real motors where it changes nothing.
#[derive(Debug)]
pub struct SimulatedActuator {
    state: Mutex<SimState>,
    changes: watch::Sender<usize>,
}

impl Default for SimulatedActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedActuator {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: Mutex::new(SimState {
                calls: Vec::new(),
                events: Vec::new(),
                current: MotionPrimitive::Stop,
                fault_on: None,
            }),
            changes,
        }
    }

    /// Make every future `apply` of `primitive` fail, or clear with `None`.
    pub fn fail_on(&self, primitive: Option<MotionPrimitive>) {
        self.state.lock().fault_on = primitive;
    }

    /// Motion-changing events in order.
    pub fn events(&self) -> Vec<ActuatorEvent> {
        self.state.lock().events.clone()
    }

    /// Motion-changing primitives in order.
    pub fn primitives(&self) -> Vec<MotionPrimitive> {
        self.state.lock().events.iter().map(|e| e.primitive).collect()
    }

    /// Every primitive passed to `apply`, including redundant stops and rejected ones.
    pub fn calls(&self) -> Vec<MotionPrimitive> {
        self.state.lock().calls.clone()
    }

    /// What the rover is doing right now.
    pub fn current(&self) -> MotionPrimitive {
        self.state.lock().current
    }

    /// Wait until at least `count` events have been logged.
    pub async fn wait_for_events(&self, count: usize, timeout: Duration) -> Result<Vec<ActuatorEvent>> {
        let mut rx = self.changes.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|n| *n >= count))
            .await
            .map_err(|_| LinkError::Timeout { duration: timeout })?
            .map_err(|_| LinkError::transport("actuator dropped"))?;
        Ok(self.events())
    }
}

#[async_trait::async_trait]
impl Actuator for SimulatedActuator {
    async fn apply(&self, primitive: MotionPrimitive, drive: &DriveConfig) -> Result<()> {
        let logged = {
            let mut state = self.state.lock();
            state.calls.push(primitive);

            if state.fault_on == Some(primitive) {
                return Err(LinkError::actuator(primitive, "simulated fault"));
            }

            if primitive == MotionPrimitive::Stop && state.current == MotionPrimitive::Stop {
                trace!("Already stopped");
                None
            } else {
                state.current = primitive;
                state.events.push(ActuatorEvent { primitive, drive: *drive, at: Instant::now() });
                Some(state.events.len())
            }
        };

        if let Some(count) = logged {
            debug!(%primitive, max_speed = drive.max_speed.kmh(), mode = %drive.operation_mode, "Simulated drive");
            self.changes.send_replace(count);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
