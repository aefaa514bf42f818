//! Daemon configuration
//!
//! Loaded from a YAML file. Every section has defaults, so an empty file (or no
//! file at all) yields a working simulated rover on `0.0.0.0:8888`.
//!
//! ```yaml
//! server:
//!   bind: 0.0.0.0:8888
//!   rover_id: rover-1
//!   session_policy: reject
//! drive:
//!   operation_mode: auto
//!   max_speed: 5
//! video:
//!   source_fps: 30
//!   max_fps: 15
//!   queue_depth: 2
//! storage:
//!   path_dir: /var/lib/roverlink/paths
//!   photo_dir: /var/lib/roverlink/photos
//! logging:
//!   level: info
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{DriveConfig, FrameRate};
use crate::{LinkError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    pub server: ServerConfig,
    /// Fallback drive settings when the settings store has none for a user
    pub drive: DriveConfig,
    pub video: VideoConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// What to do when a second console connects to a rover that is already bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPolicy {
    /// Refuse the newcomer; the bound session keeps control
    #[default]
    Reject,
    /// Tear down the bound session, then admit the newcomer
    Replace,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub rover_id: String,
    pub session_policy: SessionPolicy,
    /// Send `{command, status, message}` acknowledgements for non-motion commands
    pub acknowledge_commands: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8888)),
            rover_id: "rover".to_string(),
            session_policy: SessionPolicy::default(),
            acknowledge_commands: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Rate of the built-in test pattern source
    pub source_fps: u32,
    /// Upper bound on relayed frames per second; unset relays every frame
    pub max_fps: Option<u32>,
    /// Frames allowed to wait per session before the oldest is dropped
    pub queue_depth: usize,
}

impl VideoConfig {
    pub fn frame_rate(&self) -> FrameRate {
        match self.max_fps {
            Some(fps) => FrameRate::Max(fps),
            None => FrameRate::Native,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { source_fps: 30, max_fps: None, queue_depth: 2 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for recorded paths; in-memory when unset
    pub path_dir: Option<PathBuf>,
    pub photo_dir: PathBuf,
    /// YAML file with per-user settings
    pub settings_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path_dir: None, photo_dir: PathBuf::from("photos"), settings_file: None }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl LinkConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        debug!("Loaded config file {} ({} bytes)", path.display(), text.len());
        Self::from_yaml_str(&text)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml_ng::from_str(text).map_err(|e| LinkError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.rover_id.trim().is_empty() {
            return Err(LinkError::config("server.rover_id must not be empty"));
        }
        if self.video.queue_depth == 0 {
            return Err(LinkError::config("video.queue_depth must be at least 1"));
        }
        if self.video.source_fps == 0 {
            return Err(LinkError::config("video.source_fps must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaxSpeed, OperationMode};

    #[test]
    fn empty_file_gives_defaults() {
        let config = LinkConfig::from_yaml_str("").unwrap();
        assert_eq!(config.server.bind.port(), 8888);
        assert_eq!(config.server.session_policy, SessionPolicy::Reject);
        assert_eq!(config.drive.operation_mode, OperationMode::Auto);
        assert_eq!(config.drive.max_speed, MaxSpeed::DEFAULT);
        assert_eq!(config.video.frame_rate(), FrameRate::Native);
        assert!(config.storage.path_dir.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = LinkConfig::from_yaml_str(
            "server:\n  rover_id: field-rover\n  session_policy: replace\nvideo:\n  max_fps: 10\n",
        )
        .unwrap();
        assert_eq!(config.server.rover_id, "field-rover");
        assert_eq!(config.server.session_policy, SessionPolicy::Replace);
        assert!(config.server.acknowledge_commands);
        assert_eq!(config.video.frame_rate(), FrameRate::Max(10));
        assert_eq!(config.video.queue_depth, 2);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for yaml in [
            "drive:\n  max_speed: 99\n",
            "video:\n  queue_depth: 0\n",
            "server:\n  rover_id: ''\n",
            "server:\n  bind: not-an-address\n",
        ] {
            let err = LinkConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, LinkError::Config { .. }), "{yaml:?} gave {err:?}");
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let err = LinkConfig::load("/nonexistent/roverlink.yaml").unwrap_err();
        assert!(matches!(err, LinkError::File { .. }));
    }
}
