//! Stream combinators used by the video relay

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
