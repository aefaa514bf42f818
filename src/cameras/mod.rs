//! Camera implementations

pub mod pattern;
pub mod snapshot;

pub use pattern::TestPatternSource;
pub use snapshot::SnapshotCamera;
