//! `/health` aggregation.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::build::PipelineStats;
use crate::plugin::PluginStatus;

/// Watcher liveness shared between the serve bootstrap and /health.
#[derive(Debug, Default)]
pub struct WatcherStats {
    alive: AtomicBool,
    dropped_events: AtomicU64,
}

impl WatcherStats {
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }

    pub fn set_dropped(&self, dropped: u64) {
        self.dropped_events.store(dropped, Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

/// Aggregated liveness report.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub environment: String,
    pub components: usize,
    pub watcher: WatcherReport,
    pub build: PipelineStats,
    pub ws_clients: usize,
    pub plugins: Vec<PluginStatus>,
}

#[derive(Debug, Serialize)]
pub struct WatcherReport {
    pub alive: bool,
    pub dropped_events: u64,
}

impl HealthReport {
    /// The host is healthy when its own subsystems run; failed plugins
    /// are listed but do not degrade the host.
    pub fn gather(
        environment: &str,
        components: usize,
        watcher: &WatcherStats,
        build: PipelineStats,
        ws_clients: usize,
        plugins: Vec<PluginStatus>,
    ) -> Self {
        let status = if crate::core::is_serving() && watcher.is_alive() {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status,
            environment: environment.to_string(),
            components,
            watcher: WatcherReport {
                alive: watcher.is_alive(),
                dropped_events: watcher.dropped(),
            },
            build,
            ws_clients,
            plugins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginState;

    #[test]
    fn test_failed_plugin_does_not_degrade_host() {
        crate::core::set_serving();
        let watcher = WatcherStats::default();
        watcher.set_alive(true);

        let report = HealthReport::gather(
            "development",
            3,
            &watcher,
            PipelineStats {
                queued: 0,
                in_flight: 0,
                workers: 4,
            },
            1,
            vec![PluginStatus {
                name: "bad".to_string(),
                state: PluginState::Error,
                error: Some("nope".to_string()),
            }],
        );

        assert_eq!(report.status, "ok");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["plugins"][0]["state"], "error");
        assert_eq!(json["watcher"]["alive"], true);
    }

    #[test]
    fn test_dead_watcher_degrades() {
        crate::core::set_serving();
        let watcher = WatcherStats::default();
        watcher.set_alive(false);

        let report = HealthReport::gather(
            "development",
            0,
            &watcher,
            PipelineStats {
                queued: 0,
                in_flight: 0,
                workers: 4,
            },
            0,
            vec![],
        );
        assert_eq!(report.status, "degraded");
    }
}
