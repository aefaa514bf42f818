//! Persistence for sealed recorded paths
//!
//! Paths are keyed by route. A save replaces whatever was stored for that
//! route before; there is no history.

mod file;
mod memory;

pub use file::FilePathStore;
pub use memory::MemoryPathStore;

use crate::Result;
use crate::types::{RecordedPath, RouteId};

/// Trait for recorded path storage
#[async_trait::async_trait]
pub trait PathStore: Send + Sync + 'static {
    /// Persist `path` under its own route, replacing any previous path.
    async fn save(&self, path: &RecordedPath) -> Result<()>;

    /// Load the sealed path for `route`.
    ///
    /// Returns:
    /// - `Ok(Some(path))` - A path was recorded for this route
    /// - `Ok(None)` - Nothing recorded yet
    /// - `Err(e)` - The store could not be read
    async fn load(&self, route: &RouteId) -> Result<Option<RecordedPath>>;
}
