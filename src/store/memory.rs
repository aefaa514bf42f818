//! In-memory path store

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::PathStore;
use crate::Result;
use crate::types::{RecordedPath, RouteId};

/// Keeps sealed paths for the lifetime of the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryPathStore {
    paths: Arc<RwLock<HashMap<RouteId, RecordedPath>>>,
}

impl MemoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.read().is_empty()
    }
}

#[async_trait::async_trait]
impl PathStore for MemoryPathStore {
    async fn save(&self, path: &RecordedPath) -> Result<()> {
        self.paths.write().insert(path.route().clone(), path.clone());
        Ok(())
    }

    async fn load(&self, route: &RouteId) -> Result<Option<RecordedPath>> {
        Ok(self.paths.read().get(route).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MotionPrimitive, OpenPath};
    use tokio::time::Instant;

    fn path(route: &str, primitives: &[MotionPrimitive]) -> RecordedPath {
        let start = Instant::now();
        let mut open = OpenPath::start(RouteId::from(route), start);
        for primitive in primitives {
            open.append(*primitive, start);
        }
        open.seal()
    }

    #[tokio::test]
    async fn save_replaces_previous_path() {
        let store = MemoryPathStore::new();
        store.save(&path("4", &[MotionPrimitive::Left])).await.unwrap();
        store.save(&path("4", &[MotionPrimitive::Forward, MotionPrimitive::Stop])).await.unwrap();

        let loaded = store.load(&RouteId::from("4")).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.load(&RouteId::from("5")).await.unwrap().is_none());
    }
}
