//! Shared subsystem wiring for the serve/build/watch/list commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::build::{BuildPipeline, CommandCompiler, PipelineOptions};
use crate::cache::BuildCache;
use crate::component::ComponentRegistry;
use crate::config::TemplarConfig;
use crate::errors::ErrorCollector;
use crate::plugin::{PluginManager, builtin};
use crate::scan::Scanner;
use crate::watch::Watcher;

/// The wired core subsystems, ready to scan and build.
pub struct Runtime {
    pub config: Arc<TemplarConfig>,
    pub registry: Arc<ComponentRegistry>,
    pub collector: Arc<ErrorCollector>,
    pub plugins: Arc<PluginManager>,
    pub cache: Arc<BuildCache>,
    pub pipeline: Arc<BuildPipeline>,
    pub scanner: Arc<Scanner>,
}

impl Runtime {
    /// Build every subsystem from the loaded config.
    ///
    /// Plugins are discovered and initialized here so their hooks are
    /// live before the first scan.
    pub fn create(config: Arc<TemplarConfig>) -> Self {
        let registry = Arc::new(ComponentRegistry::new());
        let collector = Arc::new(ErrorCollector::new());

        let plugins = Arc::new(PluginManager::new());
        plugins.discover(builtin::all(&registry), &config.plugins);
        plugins.initialize_all(&config.plugins);

        let cache = Arc::new(BuildCache::default().with_disk(&config.cache_dir()));

        let pipeline = Arc::new(BuildPipeline::new(
            PipelineOptions::from_config(&config),
            Arc::clone(&cache),
            Arc::clone(&registry),
            Arc::clone(&collector),
            Arc::clone(&plugins),
            Box::new(CommandCompiler),
        ));

        let scanner = Arc::new(Scanner::new(
            Arc::clone(&registry),
            Arc::clone(&collector),
            Arc::clone(&plugins),
            config.scan_roots(),
        ));

        Self {
            config,
            registry,
            collector,
            plugins,
            cache,
            pipeline,
            scanner,
        }
    }

    /// Construct the file watcher with config and plugin patterns.
    pub fn make_watcher(&self) -> Result<Watcher> {
        let window = Duration::from_millis(self.config.development.debounce_ms);

        let mut excludes = self.config.components.exclude_patterns.clone();
        excludes.extend(self.config.build.ignore.clone());

        let mut includes = self.config.build.watch.clone();
        includes.extend(self.plugins.watch_patterns());

        let watcher = Watcher::new(window, &excludes)?;
        for root in self.config.scan_roots() {
            if root.is_dir() {
                watcher.add_path(&root, &includes)?;
            } else {
                crate::log!("watch"; "scan path missing: {}", root.display());
            }
        }

        // Config hot reload: watch the project root for templar.toml.
        watcher.add_path(&self.config.root, &["templar.toml".to_string()])?;

        Ok(watcher)
    }

    /// Orderly teardown shared by all long-running commands.
    pub fn shutdown(&self) {
        self.pipeline.stop();
        self.plugins.shutdown_all();
        self.registry.close();
    }
}
