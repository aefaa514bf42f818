//! Relayed video rate

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many frames per second the relay hands to the console.
///
/// `Max(n)` only has an effect below the source rate; a limit the source
/// never reaches, or a limit of zero, relays every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameRate {
    #[default]
    Native,
    Max(u32),
}

impl FrameRate {
    /// Minimum spacing between relayed frames for a source running at
    /// `source_fps`, or `None` to relay each frame as it arrives.
    pub fn relay_interval(self, source_fps: f64) -> Option<Duration> {
        let FrameRate::Max(limit) = self else {
            return None;
        };
        let limit = f64::from(limit);
        (limit > 0.0 && limit < source_fps).then(|| Duration::from_secs_f64(limit.recip()))
    }
}
