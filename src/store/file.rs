//! Directory-backed path store: one JSON document per route

use std::path::{Path, PathBuf};
use tracing::debug;

use super::PathStore;
use crate::types::{RecordedPath, RouteId};
use crate::{LinkError, Result};

/// Stores each route's path as `<dir>/route_<key>.json`, keyed by
/// [`RouteId::file_key`].
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written path.
#[derive(Debug, Clone)]
pub struct FilePathStore {
    dir: PathBuf,
}

impl FilePathStore {
    /// Open (and create if needed) the store directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| LinkError::file_error(dir.clone(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, route: &RouteId) -> PathBuf {
        self.dir.join(format!("route_{}.json", route.file_key()))
    }
}

#[async_trait::async_trait]
impl PathStore for FilePathStore {
    async fn save(&self, path: &RecordedPath) -> Result<()> {
        let route = path.route();
        let target = self.path_for(route);
        let staging = target.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(path)
            .map_err(|e| LinkError::store(route.clone(), e.to_string()))?;
        tokio::fs::write(&staging, &body)
            .await
            .map_err(|e| LinkError::store(route.clone(), format!("write failed: {e}")))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| LinkError::store(route.clone(), format!("rename failed: {e}")))?;

        debug!(route = %route, entries = path.len(), "Path written to {}", target.display());
        Ok(())
    }

    async fn load(&self, route: &RouteId) -> Result<Option<RecordedPath>> {
        let source = self.path_for(route);
        let body = match tokio::fs::read(&source).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LinkError::store(route.clone(), format!("read failed: {e}"))),
        };

        let path: RecordedPath = serde_json::from_slice(&body)
            .map_err(|e| LinkError::store(route.clone(), e.to_string()))?;
        if path.route() != route {
            return Err(LinkError::store(
                route.clone(),
                format!("{} holds a path for route {}", source.display(), path.route()),
            ));
        }
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MotionPrimitive, OpenPath};
    use std::time::Duration;
    use tokio::time::Instant;

    fn sample(route: &str) -> RecordedPath {
        let start = Instant::now();
        let mut open = OpenPath::start(RouteId::from(route), start);
        open.append(MotionPrimitive::Left, start);
        open.append(MotionPrimitive::Stop, start + Duration::from_millis(200));
        open.seal()
    }

    #[tokio::test]
    async fn saved_path_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePathStore::open(dir.path().join("paths")).await.unwrap();
        store.save(&sample("route/7")).await.unwrap();

        let reopened = FilePathStore::open(store.dir().to_path_buf()).await.unwrap();
        let loaded = reopened.load(&RouteId::from("route/7")).await.unwrap().unwrap();
        assert_eq!(loaded, sample("route/7"));
        assert_eq!(loaded.entries()[1].offset, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn similar_routes_keep_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePathStore::open(dir.path()).await.unwrap();
        let routes = ["a/b", "a_b", "a b", "a+b"];
        for route in routes {
            store.save(&sample(route)).await.unwrap();
        }

        for route in routes {
            let loaded = store.load(&RouteId::from(route)).await.unwrap().unwrap();
            assert_eq!(loaded.route(), &RouteId::from(route));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), routes.len());
    }

    #[tokio::test]
    async fn missing_route_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePathStore::open(dir.path()).await.unwrap();
        assert!(store.load(&RouteId::from("nothing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePathStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("route_3.json"), b"{not json").unwrap();

        let err = store.load(&RouteId::from("3")).await.unwrap_err();
        assert!(matches!(err, LinkError::Store { .. }));
    }
}
