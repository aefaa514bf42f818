//! Still camera that saves the most recent relayed frame

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::info;

use crate::camera::StillCamera;
use crate::types::{RouteId, VideoFrame};
use crate::{LinkError, Result};

/// Writes the latest frame published by the video relay to `photo_dir`.
///
/// File names follow `route_<key>_<unix seconds>.jpg`. A name is claimed with
/// an exclusive create, so photos taken in the same second, even at once,
/// get `_<n>` suffixes rather than overwriting each other.
pub struct SnapshotCamera {
    latest: watch::Receiver<Option<Arc<VideoFrame>>>,
    photo_dir: PathBuf,
}

impl SnapshotCamera {
    pub fn new(latest: watch::Receiver<Option<Arc<VideoFrame>>>, photo_dir: impl Into<PathBuf>) -> Self {
        Self { latest, photo_dir: photo_dir.into() }
    }

    pub fn photo_dir(&self) -> &Path {
        &self.photo_dir
    }

    /// Create a photo file under a name nobody else holds.
    async fn reserve(&self, route: &RouteId) -> Result<(String, File)> {
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let base = format!("route_{}_{}", route.file_key(), stamp);
        let mut n = 0;
        loop {
            let candidate = if n == 0 { format!("{base}.jpg") } else { format!("{base}_{n}.jpg") };
            let path = self.photo_dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(LinkError::camera(format!("failed to create {}: {e}", path.display()))),
            }
        }
    }
}

#[async_trait::async_trait]
impl StillCamera for SnapshotCamera {
    async fn capture_still(&self, route: &RouteId) -> Result<String> {
        let frame = self
            .latest
            .borrow()
            .clone()
            .ok_or_else(|| LinkError::camera("no frame captured yet"))?;

        tokio::fs::create_dir_all(&self.photo_dir)
            .await
            .map_err(|e| LinkError::camera(format!("photo directory unavailable: {e}")))?;

        let (filename, mut file) = self.reserve(route).await?;
        let written = async {
            file.write_all(&frame.data[..]).await?;
            file.flush().await
        };
        written.await.map_err(|e| LinkError::camera(format!("failed to write {filename}: {e}")))?;

        info!(route = %route, sequence = frame.sequence, "Photo saved: {}", filename);
        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fails_before_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, rx) = watch::channel(None);
        let camera = SnapshotCamera::new(rx, dir.path());
        let err = camera.capture_still(&RouteId::from("1")).await.unwrap_err();
        assert!(matches!(err, LinkError::Camera { .. }));
    }

    #[tokio::test]
    async fn writes_latest_frame_with_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(None);
        let camera = SnapshotCamera::new(rx, dir.path().join("photos"));

        tx.send_replace(Some(Arc::new(VideoFrame::new(vec![0xff, 0xd8, 0x01], 1))));
        let first = camera.capture_still(&RouteId::from("12")).await.unwrap();
        tx.send_replace(Some(Arc::new(VideoFrame::new(vec![0xff, 0xd8, 0x02], 2))));
        let second = camera.capture_still(&RouteId::from("12")).await.unwrap();

        assert!(first.starts_with("route_12_") && first.ends_with(".jpg"));
        assert_ne!(first, second);
        let saved = std::fs::read(camera.photo_dir().join(&second)).unwrap();
        assert_eq!(saved, vec![0xff, 0xd8, 0x02]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn simultaneous_captures_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(None);
        tx.send_replace(Some(Arc::new(VideoFrame::new(vec![0xff, 0xd8, 0x07], 7))));
        let camera = Arc::new(SnapshotCamera::new(rx, dir.path()));

        let captures = (0..8).map(|_| {
            let camera = Arc::clone(&camera);
            tokio::spawn(async move { camera.capture_still(&RouteId::from("4")).await })
        });
        let mut names: Vec<String> = futures::future::join_all(captures)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        names.sort();
        names.dedup();

        assert_eq!(names.len(), 8);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 8);
        for name in &names {
            assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), vec![0xff, 0xd8, 0x07]);
        }
    }
}
