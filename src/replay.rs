//! Replay driver: plays a sealed path back through the actuator

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::actuator::{Actuator, apply_or_stop, fail_safe_stop};
use crate::types::{DriveConfig, RecordedPath, RouteId};
use crate::LinkError;

/// How a replay ended
#[derive(Debug)]
pub enum ReplayOutcome {
    /// Every entry was emitted, followed by a `stop`
    Completed { steps: usize },
    /// Cancelled before the end; a `stop` was emitted and the rest discarded
    Cancelled { emitted: usize },
    /// The actuator refused a primitive; a `stop` was emitted
    Faulted { emitted: usize, error: LinkError },
}

/// Handle to a running replay task
pub struct ReplayHandle {
    route: RouteId,
    cancel: CancellationToken,
    task: JoinHandle<ReplayOutcome>,
}

impl ReplayHandle {
    pub fn route(&self) -> &RouteId {
        &self.route
    }

    /// Ask the driver to stop; it emits `stop` and discards remaining entries.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the driver to finish.
    ///
    /// Cancellation safe; must not be polled again once it has returned.
    pub(crate) async fn join(&mut self) -> ReplayOutcome {
        match (&mut self.task).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(route = %self.route, "Replay task aborted: {}", e);
                ReplayOutcome::Cancelled { emitted: 0 }
            }
        }
    }
}

impl Drop for ReplayHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns replay tasks
///
/// Each primitive is emitted after sleeping for the gap to the previous entry,
/// so timing is relative to when the replay started rather than to the
/// wall-clock times of the recording.
pub struct ReplayDriver;

impl ReplayDriver {
    pub fn spawn(path: RecordedPath, actuator: Arc<dyn Actuator>, drive: DriveConfig) -> ReplayHandle {
        let cancel = CancellationToken::new();
        let route = path.route().clone();
        let task = tokio::spawn(Self::replay_task(path, actuator, drive, cancel.clone()));
        ReplayHandle { route, cancel, task }
    }

    async fn replay_task(
        path: RecordedPath,
        actuator: Arc<dyn Actuator>,
        drive: DriveConfig,
        cancel: CancellationToken,
    ) -> ReplayOutcome {
        info!(route = %path.route(), steps = path.len(), duration = ?path.duration(), "Replay started");
        let mut emitted = 0usize;

        for (delay, primitive) in path.steps() {
            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if cancelled {
                debug!(route = %path.route(), emitted, "Replay cancelled");
                fail_safe_stop(actuator.as_ref(), &drive).await;
                return ReplayOutcome::Cancelled { emitted };
            }

            trace!(route = %path.route(), %primitive, ?delay, "Replay step");
            if let Err(error) = apply_or_stop(actuator.as_ref(), primitive, &drive).await {
                return ReplayOutcome::Faulted { emitted, error };
            }
            emitted += 1;
        }

        fail_safe_stop(actuator.as_ref(), &drive).await;
        info!(route = %path.route(), steps = emitted, "Replay finished");
        ReplayOutcome::Completed { steps: emitted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::SimulatedActuator;
    use crate::types::{MotionPrimitive, OpenPath};
    use std::time::Duration;
    use tokio::time::Instant;

    fn path(steps: &[(u64, MotionPrimitive)]) -> RecordedPath {
        let start = Instant::now();
        let mut open = OpenPath::start(RouteId::from("r"), start);
        for (ms, primitive) in steps {
            open.append(*primitive, start + Duration::from_millis(*ms));
        }
        open.seal()
    }

    #[tokio::test(start_paused = true)]
    async fn replays_relative_offsets_then_stops() {
        let actuator = Arc::new(SimulatedActuator::new());
        let recorded = path(&[
            (500, MotionPrimitive::Forward),
            (800, MotionPrimitive::Left),
            (1000, MotionPrimitive::Stop),
        ]);

        let started = Instant::now();
        let mut handle = ReplayDriver::spawn(recorded, actuator.clone(), DriveConfig::default());
        let outcome = handle.join().await;
        assert!(matches!(outcome, ReplayOutcome::Completed { steps: 3 }));

        let events = actuator.events();
        let seen: Vec<_> = events.iter().map(|e| e.primitive).collect();
        assert_eq!(seen, vec![MotionPrimitive::Forward, MotionPrimitive::Left, MotionPrimitive::Stop]);

        // First entry plays immediately; the rest keep their gaps
        let offsets: Vec<_> = events.iter().map(|e| e.at.duration_since(started)).collect();
        assert_eq!(offsets[0], Duration::ZERO);
        assert_eq!(offsets[1], Duration::from_millis(300));
        assert_eq!(offsets[2], Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_emits_stop_and_discards_rest() {
        let actuator = Arc::new(SimulatedActuator::new());
        let recorded = path(&[(0, MotionPrimitive::Forward), (5_000, MotionPrimitive::Right)]);

        let mut handle = ReplayDriver::spawn(recorded, actuator.clone(), DriveConfig::default());
        actuator.wait_for_events(1, Duration::from_secs(1)).await.unwrap();
        handle.cancel();

        let outcome = handle.join().await;
        assert!(matches!(outcome, ReplayOutcome::Cancelled { emitted: 1 }));
        assert_eq!(actuator.primitives(), vec![MotionPrimitive::Forward, MotionPrimitive::Stop]);
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_fault_ends_replay_with_stop() {
        let actuator = Arc::new(SimulatedActuator::new());
        actuator.fail_on(Some(MotionPrimitive::Left));
        let recorded = path(&[
            (0, MotionPrimitive::Forward),
            (100, MotionPrimitive::Left),
            (200, MotionPrimitive::Forward),
        ]);

        let mut handle = ReplayDriver::spawn(recorded, actuator.clone(), DriveConfig::default());
        match handle.join().await {
            ReplayOutcome::Faulted { emitted, error } => {
                assert_eq!(emitted, 1);
                assert!(matches!(error, LinkError::Actuator { primitive: MotionPrimitive::Left, .. }));
            }
            other => panic!("expected fault, got {other:?}"),
        }
        assert_eq!(actuator.current(), MotionPrimitive::Stop);
    }
}
