//! Settings store adapters
//!
//! The dashboard owns operator preferences; the control channel only reads
//! them when a session is accepted.
//!
//! The file-backed store reads a YAML map keyed by user:
//!
//! ```yaml
//! alice:
//!   operation_mode: manual
//!   max_speed: 12
//!   email_notification: true
//!   email_address: alice@example.com
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{DriveConfig, DrivePreferences, MaxSpeed, NotificationSettings, OperationMode};
use crate::{LinkError, Result};

/// Trait for per-user preference lookups
#[async_trait::async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// Drive preferences for `user`; `None` or an unset field means the
    /// configured default applies.
    async fn rover_settings(&self, user: Option<&str>) -> Result<Option<DrivePreferences>>;

    /// Notification preferences for `user`; `None` means notifications are off.
    async fn notification_settings(&self, user: Option<&str>) -> Result<Option<NotificationSettings>>;
}

/// Settings that are the same for every user.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings {
    drive: Option<DriveConfig>,
    notifications: Option<NotificationSettings>,
}

impl StaticSettings {
    pub fn new(drive: Option<DriveConfig>, notifications: Option<NotificationSettings>) -> Self {
        Self { drive, notifications }
    }
}

#[async_trait::async_trait]
impl SettingsStore for StaticSettings {
    async fn rover_settings(&self, _user: Option<&str>) -> Result<Option<DrivePreferences>> {
        Ok(self.drive.map(DrivePreferences::from))
    }

    async fn notification_settings(&self, _user: Option<&str>) -> Result<Option<NotificationSettings>> {
        Ok(self.notifications.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserSettings {
    operation_mode: Option<OperationMode>,
    max_speed: Option<MaxSpeed>,
    email_notification: Option<bool>,
    email_address: Option<String>,
}

impl UserSettings {
    fn drive(&self) -> Option<DrivePreferences> {
        let preferences = DrivePreferences { operation_mode: self.operation_mode, max_speed: self.max_speed };
        (!preferences.is_empty()).then_some(preferences)
    }

    fn notifications(&self) -> Option<NotificationSettings> {
        if self.email_notification.is_none() && self.email_address.is_none() {
            return None;
        }
        Some(NotificationSettings {
            email_notification: self.email_notification.unwrap_or(false),
            email_address: self.email_address.clone(),
        })
    }
}

/// Reads per-user settings from a YAML file.
///
/// The file is re-read on every lookup so edits made by the dashboard take
/// effect for the next session. A missing file means no user has settings.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn user(&self, user: Option<&str>) -> Result<Option<UserSettings>> {
        let Some(user) = user else {
            return Ok(None);
        };

        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LinkError::file_error(self.path.clone(), e)),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut users: HashMap<String, UserSettings> = serde_yaml_ng::from_str(&text)
            .map_err(|e| LinkError::config(format!("{}: {e}", self.path.display())))?;
        debug!(user, known_users = users.len(), "Settings file read");
        Ok(users.remove(user))
    }
}

#[async_trait::async_trait]
impl SettingsStore for FileSettingsStore {
    async fn rover_settings(&self, user: Option<&str>) -> Result<Option<DrivePreferences>> {
        Ok(self.user(user).await?.and_then(|settings| settings.drive()))
    }

    async fn notification_settings(&self, user: Option<&str>) -> Result<Option<NotificationSettings>> {
        Ok(self.user(user).await?.and_then(|settings| settings.notifications()))
    }
}
