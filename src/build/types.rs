//! Pipeline task and result types.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::errors::ParsedError;

/// A queued compilation request.
///
/// Created by scan-induced events or explicit API calls; consumed by
/// exactly one worker. Higher priority runs sooner; ties break FIFO.
#[derive(Debug, Clone)]
pub struct BuildTask {
    pub component_name: String,
    pub priority: i32,
    pub enqueued_at: SystemTime,
}

impl BuildTask {
    pub fn new(component_name: impl Into<String>, priority: i32) -> Self {
        Self {
            component_name: component_name.into(),
            priority,
            enqueued_at: SystemTime::now(),
        }
    }
}

/// Outcome of one build, delivered to subscribers and owned by the
/// cache afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    pub component_name: String,
    pub content_hash: String,
    pub success: bool,
    /// Rendered output; `None` for failed builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<Vec<u8>>,
    pub duration: Duration,
    pub errors: Vec<ParsedError>,
    pub cache_hit: bool,
    pub produced_at: SystemTime,
}

impl BuildResult {
    pub fn success(
        component_name: impl Into<String>,
        content_hash: impl Into<String>,
        output_bytes: Vec<u8>,
        duration: Duration,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            content_hash: content_hash.into(),
            success: true,
            output_bytes: Some(output_bytes),
            duration,
            errors: Vec::new(),
            cache_hit: false,
            produced_at: SystemTime::now(),
        }
    }

    pub fn failure(
        component_name: impl Into<String>,
        content_hash: impl Into<String>,
        errors: Vec<ParsedError>,
        duration: Duration,
    ) -> Self {
        Self {
            component_name: component_name.into(),
            content_hash: content_hash.into(),
            success: false,
            output_bytes: None,
            duration,
            errors,
            cache_hit: false,
            produced_at: SystemTime::now(),
        }
    }

    /// Mark as served from cache.
    pub fn as_cache_hit(mut self) -> Self {
        self.cache_hit = true;
        self
    }

    /// Approximate in-memory footprint, for cache byte accounting.
    pub fn size_bytes(&self) -> usize {
        self.output_bytes.as_ref().map(Vec::len).unwrap_or(0)
            + self
                .errors
                .iter()
                .map(|e| e.message.len() + 64)
                .sum::<usize>()
            + self.component_name.len()
            + self.content_hash.len()
    }
}
