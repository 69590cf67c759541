//! Live Reload Message Protocol
//!
//! Defines the JSON message format for WebSocket communication between
//! the development server and browser clients:
//!
//! ```json
//! {"type": "build_success", "target": "Button",
//!  "data": {...}, "timestamp": "2026-08-01T12:00:00Z"}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::build::BuildResult;

/// Event discriminator on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadEvent {
    ComponentUpdated,
    BuildSuccess,
    BuildError,
    FullReload,
    Shutdown,
}

/// A live-reload message sent over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadMessage {
    #[serde(rename = "type")]
    pub event: ReloadEvent,
    /// Component name, empty for whole-server events.
    pub target: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    pub data: serde_json::Value,
    pub timestamp: String,
}

impl ReloadMessage {
    pub fn new(event: ReloadEvent, target: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event,
            target: target.into(),
            data,
            timestamp: rfc3339_now(),
        }
    }

    /// Registry transition for a component.
    pub fn component_updated(target: impl Into<String>, kind: &str) -> Self {
        Self::new(
            ReloadEvent::ComponentUpdated,
            target,
            serde_json::json!({ "kind": kind }),
        )
    }

    /// Pipeline published a result.
    pub fn from_build_result(result: &BuildResult) -> Self {
        let event = if result.success {
            ReloadEvent::BuildSuccess
        } else {
            ReloadEvent::BuildError
        };
        Self::new(
            event,
            result.component_name.clone(),
            serde_json::json!({
                "cache_hit": result.cache_hit,
                "duration_ms": result.duration.as_millis() as u64,
                "errors": result.errors,
            }),
        )
    }

    /// Config change or non-component dependency change.
    pub fn full_reload(reason: &str) -> Self {
        Self::new(
            ReloadEvent::FullReload,
            "",
            serde_json::json!({ "reason": reason }),
        )
    }

    pub fn shutdown() -> Self {
        Self::new(ReloadEvent::Shutdown, "", serde_json::Value::Null)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn rfc3339_now() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ============================================================================
// Tests
// ============================================================================
