//! Fault notifications for operators who asked for them

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::types::RouteId;
use crate::{LinkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Actuator,
    Photo,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Actuator => f.write_str("actuator"),
            FaultKind::Photo => f.write_str("photo"),
        }
    }
}

/// A fault worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultNotice {
    pub route: Option<RouteId>,
    pub kind: FaultKind,
    pub detail: String,
    pub email: String,
}

impl FaultNotice {
    /// Build a notice for `error`, classifying it by the error variant.
    ///
    /// Returns `None` for errors that are not operator-facing faults.
    pub fn for_error(route: Option<RouteId>, error: &LinkError, email: &str) -> Option<Self> {
        let kind = match error {
            LinkError::Actuator { .. } => FaultKind::Actuator,
            LinkError::Camera { .. } => FaultKind::Photo,
            _ => return None,
        };
        Some(Self { route, kind, detail: error.to_string(), email: email.to_string() })
    }
}

/// Trait for delivering fault notices. Delivery mechanics live elsewhere.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, notice: FaultNotice) -> Result<()>;
}

/// Writes notices to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: FaultNotice) -> Result<()> {
        let route = notice.route.as_ref().map(RouteId::as_str).unwrap_or("-");
        warn!(kind = %notice.kind, route, email = %notice.email, "Fault notice: {}", notice.detail);
        Ok(())
    }
}
