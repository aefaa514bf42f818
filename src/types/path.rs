//! Recorded motion paths

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use super::motion::MotionPrimitive;
use super::route::RouteId;
use crate::LinkError;

/// One step of a recorded path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub primitive: MotionPrimitive,
    /// Time since recording started
    #[serde(rename = "offset_ms", with = "duration_millis")]
    pub offset: Duration,
}

/// A path that is still being recorded.
///
/// Only the recorder holds one; it becomes a [`RecordedPath`] once sealed and
/// can no longer change.
#[derive(Debug)]
pub struct OpenPath {
    route: RouteId,
    started_at: Instant,
    entries: Vec<PathEntry>,
}

impl OpenPath {
    pub fn start(route: RouteId, started_at: Instant) -> Self {
        Self { route, started_at, entries: Vec::new() }
    }

    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a primitive observed at `now`.
    ///
    /// Offsets never go backwards even if `now` is earlier than the previous
    /// entry's instant.
    pub fn append(&mut self, primitive: MotionPrimitive, now: Instant) {
        let offset = now.saturating_duration_since(self.started_at);
        let floor = self.entries.last().map(|e| e.offset).unwrap_or_default();
        self.entries.push(PathEntry { primitive, offset: offset.max(floor) });
    }

    pub fn seal(self) -> RecordedPath {
        RecordedPath { route: self.route, entries: self.entries }
    }
}

/// A sealed, ordered log of primitives with relative timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecordedPath")]
pub struct RecordedPath {
    #[serde(rename = "route_id")]
    route: RouteId,
    entries: Vec<PathEntry>,
}

impl RecordedPath {
    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the last entry.
    pub fn duration(&self) -> Duration {
        self.entries.last().map(|e| e.offset).unwrap_or_default()
    }

    /// Replay steps: each primitive paired with the delay since the previous
    /// one. The first step has no delay.
    pub fn steps(&self) -> impl Iterator<Item = (Duration, MotionPrimitive)> + '_ {
        let mut previous: Option<Duration> = None;
        self.entries.iter().map(move |entry| {
            let delay = previous.map(|p| entry.offset.saturating_sub(p)).unwrap_or_default();
            previous = Some(entry.offset);
            (delay, entry.primitive)
        })
    }
}

#[derive(Deserialize)]
struct RawRecordedPath {
    route_id: RouteId,
    #[serde(default)]
    entries: Vec<PathEntry>,
}

impl TryFrom<RawRecordedPath> for RecordedPath {
    type Error = LinkError;

    fn try_from(raw: RawRecordedPath) -> Result<Self, Self::Error> {
        if raw.entries.windows(2).any(|pair| pair[1].offset < pair[0].offset) {
            return Err(LinkError::store(raw.route_id, "path entries are not in offset order"));
        }
        Ok(Self { route: raw.route_id, entries: raw.entries })
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_relative_to_previous_entry() {
        let start = Instant::now();
        let mut path = OpenPath::start(RouteId::from("1"), start);
        path.append(MotionPrimitive::Left, start + Duration::from_millis(500));
        path.append(MotionPrimitive::Stop, start + Duration::from_millis(700));
        path.append(MotionPrimitive::Forward, start + Duration::from_millis(1000));
        let sealed = path.seal();

        let steps: Vec<_> = sealed.steps().collect();
        assert_eq!(
            steps,
            vec![
                (Duration::ZERO, MotionPrimitive::Left),
                (Duration::from_millis(200), MotionPrimitive::Stop),
                (Duration::from_millis(300), MotionPrimitive::Forward),
            ]
        );
        assert_eq!(sealed.duration(), Duration::from_millis(1000));
    }

    #[test]
    fn offsets_never_decrease() {
        let start = Instant::now();
        let mut path = OpenPath::start(RouteId::from("1"), start);
        path.append(MotionPrimitive::Left, start + Duration::from_millis(50));
        path.append(MotionPrimitive::Stop, start);
        let sealed = path.seal();
        assert_eq!(sealed.entries()[1].offset, Duration::from_millis(50));
    }

    #[test]
    fn stored_form_is_validated() {
        let json = r#"{"route_id":"9","entries":[
            {"primitive":"left","offset_ms":0},
            {"primitive":"stop","offset_ms":200}]}"#;
        let path: RecordedPath = serde_json::from_str(json).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.route(), &RouteId::from("9"));

        let unordered = r#"{"route_id":"9","entries":[
            {"primitive":"left","offset_ms":300},
            {"primitive":"stop","offset_ms":200}]}"#;
        assert!(serde_json::from_str::<RecordedPath>(unordered).is_err());
    }
}
