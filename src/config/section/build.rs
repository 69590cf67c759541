//! `[build]` section configuration.
//!
//! ```toml
//! [build]
//! command = "templ"
//! args = ["generate", "-f", "$TEMPLAR_FILE"]
//! watch = ["**/*.templ"]
//! ignore = ["**/*_templ.go"]
//! cache_dir = ".templar/cache"
//! workers = 0                 # 0 = min(CPU, 8)
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Compiler invocation and pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Compiler binary. Must be on the argv allowlist (`templ`, `go`).
    pub command: String,

    /// Compiler arguments; `$TEMPLAR_*` variables are substituted.
    pub args: Vec<String>,

    /// Glob patterns that trigger rebuilds.
    pub watch: Vec<String>,

    /// Glob patterns the watcher ignores.
    pub ignore: Vec<String>,

    /// Cache directory, relative to the project root.
    pub cache_dir: PathBuf,

    /// Worker thread count; `0` picks `min(CPU, 8)`.
    pub workers: usize,

    /// Seconds to wait for in-flight builds during shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: "templ".to_string(),
            args: vec![
                "generate".to_string(),
                "-f".to_string(),
                "$TEMPLAR_FILE".to_string(),
            ],
            watch: vec!["**/*.templ".to_string()],
            ignore: vec!["**/*_templ.go".to_string()],
            cache_dir: PathBuf::from(".templar/cache"),
            workers: 0,
            shutdown_grace_secs: 30,
        }
    }
}

impl BuildConfig {
    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(8)
    }
}
