//! Drive and notification preferences read from the settings store

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{LinkError, Result};

/// How the rover is being operated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    #[default]
    Auto,
    Manual,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMode::Auto => f.write_str("auto"),
            OperationMode::Manual => f.write_str("manual"),
        }
    }
}

/// Maximum speed in km/h, bounded to what the dashboard allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MaxSpeed(u8);

impl MaxSpeed {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;
    pub const DEFAULT: MaxSpeed = MaxSpeed(5);

    pub fn new(kmh: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&kmh) {
            Ok(Self(kmh))
        } else {
            Err(LinkError::config(format!(
                "max_speed {kmh} outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn kmh(self) -> u8 {
        self.0
    }

    /// Motor duty cycle in percent at this speed limit.
    pub fn duty_percent(self) -> u8 {
        ((self.0 as u16 * 100) / Self::MAX as u16) as u8
    }
}

impl Default for MaxSpeed {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for MaxSpeed {
    type Error = LinkError;

    fn try_from(kmh: u8) -> Result<Self> {
        Self::new(kmh)
    }
}

impl From<MaxSpeed> for u8 {
    fn from(speed: MaxSpeed) -> Self {
        speed.0
    }
}

/// Drive configuration handed to the actuator with every primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub operation_mode: OperationMode,
    pub max_speed: MaxSpeed,
}

/// Drive preferences a user has set. Unset fields take the rover's
/// configured defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivePreferences {
    pub operation_mode: Option<OperationMode>,
    pub max_speed: Option<MaxSpeed>,
}

impl DrivePreferences {
    pub fn is_empty(&self) -> bool {
        self.operation_mode.is_none() && self.max_speed.is_none()
    }

    /// Layer these preferences over `defaults`.
    pub fn over(self, defaults: DriveConfig) -> DriveConfig {
        DriveConfig {
            operation_mode: self.operation_mode.unwrap_or(defaults.operation_mode),
            max_speed: self.max_speed.unwrap_or(defaults.max_speed),
        }
    }
}

impl From<DriveConfig> for DrivePreferences {
    fn from(drive: DriveConfig) -> Self {
        Self { operation_mode: Some(drive.operation_mode), max_speed: Some(drive.max_speed) }
    }
}

/// Notification preferences of the operator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub email_notification: bool,
    pub email_address: Option<String>,
}

impl NotificationSettings {
    /// Address to notify, if notifications are switched on and an address is set.
    pub fn recipient(&self) -> Option<&str> {
        if self.email_notification {
            self.email_address.as_deref().filter(|addr| !addr.trim().is_empty())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_speed_bounds() {
        assert!(MaxSpeed::new(0).is_err());
        assert!(MaxSpeed::new(21).is_err());
        assert_eq!(MaxSpeed::new(20).unwrap().duty_percent(), 100);
        assert_eq!(MaxSpeed::default().kmh(), 5);
        assert_eq!(MaxSpeed::default().duty_percent(), 25);
    }

    #[test]
    fn max_speed_deserialization_is_bounded() {
        let ok: DriveConfig = serde_yaml_ng::from_str("max_speed: 12\noperation_mode: manual").unwrap();
        assert_eq!(ok.max_speed.kmh(), 12);
        assert_eq!(ok.operation_mode, OperationMode::Manual);
        assert!(serde_yaml_ng::from_str::<DriveConfig>("max_speed: 50").is_err());
    }

    #[test]
    fn unset_preferences_keep_configured_defaults() {
        let configured = DriveConfig { operation_mode: OperationMode::Manual, max_speed: MaxSpeed::new(8).unwrap() };
        let speed_only = DrivePreferences { max_speed: Some(MaxSpeed::new(3).unwrap()), ..Default::default() };

        let drive = speed_only.over(configured);
        assert_eq!(drive.operation_mode, OperationMode::Manual);
        assert_eq!(drive.max_speed.kmh(), 3);
        assert_eq!(DrivePreferences::default().over(configured), configured);
        assert!(DrivePreferences::default().is_empty());
    }

    #[test]
    fn recipient_requires_opt_in() {
        let mut settings = NotificationSettings {
            email_notification: false,
            email_address: Some("ops@example.com".into()),
        };
        assert_eq!(settings.recipient(), None);
        settings.email_notification = true;
        assert_eq!(settings.recipient(), Some("ops@example.com"));
        settings.email_address = Some("  ".into());
        assert_eq!(settings.recipient(), None);
    }
}
