//! Actuator trait for drive sinks

use tracing::{error, warn};

use crate::Result;
use crate::types::{DriveConfig, MotionPrimitive};

/// Trait for the rover's drive hardware (or a stand-in for it)
///
/// One actuator exists per rover and is shared by whichever session is bound
/// to it and that session's replay driver, hence `&self`. Implementations
/// serialize internally.
///
/// `apply` must treat `stop` on an already stopped rover as a no-op rather
/// than an error. Returning `Err` means the primitive was not applied; callers
/// follow up with a `stop`.
#[async_trait::async_trait]
pub trait Actuator: Send + Sync + 'static {
    /// Apply one primitive under the given drive configuration
    async fn apply(&self, primitive: MotionPrimitive, drive: &DriveConfig) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &str {
        "actuator"
    }
}

/// Issue a `stop`, logging rather than propagating a failure.
///
/// Used wherever motion must end no matter what: teardown, replay end, and
/// after a faulted primitive.
pub(crate) async fn fail_safe_stop(actuator: &dyn Actuator, drive: &DriveConfig) -> bool {
    match actuator.apply(MotionPrimitive::Stop, drive).await {
        Ok(()) => true,
        Err(e) => {
            error!(actuator = actuator.name(), "Fail-safe stop was rejected: {}", e);
            false
        }
    }
}

/// Apply `primitive`; on failure issue a fail-safe `stop` and return the fault.
pub(crate) async fn apply_or_stop(
    actuator: &dyn Actuator,
    primitive: MotionPrimitive,
    drive: &DriveConfig,
) -> Result<()> {
    match actuator.apply(primitive, drive).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(actuator = actuator.name(), %primitive, "Actuator fault: {}", e);
            if primitive.is_motion() {
                fail_safe_stop(actuator, drive).await;
            }
            Err(e)
        }
    }
}
