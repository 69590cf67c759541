//! Plugin manager: discovery, lifecycle, and hook fan-out.
//!
//! Initialization runs under a timeout in its own thread, so a hung or
//! panicking plugin lands in the `Error` state without stalling the
//! host. Hooks run in stable name order; hook errors are logged and
//! surfaced but never propagate as panics.

mod api;
pub mod builtin;

pub use api::{
    BuildHook, ComponentHandler, Plugin, PluginRequest, PluginResponse, PluginState, ServerHook,
    WatcherHook, validate_plugin_name,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::build::BuildResult;
use crate::component::ComponentInfo;
use crate::config::PluginsConfig;
use crate::errors::TemplarError;

/// Default initialization timeout per plugin.
pub const INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `disable` waits for in-flight hooks.
const DISABLE_GRACE: Duration = Duration::from_secs(5);

struct Entry {
    plugin: Arc<dyn Plugin>,
    state: PluginState,
    error: Option<String>,
    /// Hook invocations currently running for this plugin.
    in_flight: Arc<AtomicUsize>,
}

/// Serializable status row for /health.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PluginStatus {
    pub name: String,
    pub state: PluginState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Owns every plugin and its lifecycle.
///
/// `BTreeMap` keying gives the deterministic name ordering the hook
/// contract requires.
pub struct PluginManager {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // Discovery & lifecycle
    // ------------------------------------------------------------------

    /// Register candidate plugins from the static registry, filtered by
    /// name validation. Invalid names are skipped with a log line.
    pub fn discover(&self, candidates: Vec<Arc<dyn Plugin>>, config: &PluginsConfig) {
        let mut entries = self.entries.write();
        for plugin in candidates {
            let name = plugin.name().to_string();
            if !validate_plugin_name(&name) {
                crate::log!("plugin"; "invalid plugin name `{}`, skipped", name);
                continue;
            }
            if entries.contains_key(&name) {
                crate::log!("plugin"; "duplicate plugin `{}`, skipped", name);
                continue;
            }
            entries.insert(
                name,
                Entry {
                    plugin,
                    state: PluginState::Loaded,
                    error: None,
                    in_flight: Arc::new(AtomicUsize::new(0)),
                },
            );
        }
        drop(entries);

        // Configured names that resolved to nothing are diagnostics.
        for name in config.enabled.iter().chain(&config.disabled) {
            if !self.entries.read().contains_key(name) {
                crate::log!("plugin"; "configured plugin `{}` not found", name);
            }
        }

        for dir in &config.discovery_paths {
            if !dir.is_dir() {
                crate::debug!("plugin"; "discovery path missing: {}", dir.display());
            }
        }
    }

    /// Initialize every loaded plugin (timeout-guarded), then enable
    /// per the config lists. A failed init disables only that plugin.
    pub fn initialize_all(&self, config: &PluginsConfig) {
        let names: Vec<String> = self.entries.read().keys().cloned().collect();

        for name in names {
            let plugin = match self.entries.read().get(&name) {
                Some(entry) => Arc::clone(&entry.plugin),
                None => continue,
            };
            let plugin_config = config.configurations.get(&name).cloned();

            match run_initialize(&plugin, plugin_config) {
                Ok(()) => {
                    self.set_state(&name, PluginState::Initialized, None);
                    let enable = config.enabled.iter().any(|n| n == &name)
                        && !config.disabled.iter().any(|n| n == &name);
                    if enable {
                        self.set_state(&name, PluginState::Enabled, None);
                        crate::log!("plugin"; "`{}` enabled", name);
                    }
                }
                Err(e) => {
                    crate::log!("plugin"; "`{}` failed to initialize: {}", name, e);
                    self.set_state(&name, PluginState::Error, Some(e.to_string()));
                }
            }
        }
    }

    /// Enable an initialized or disabled plugin at runtime.
    pub fn enable(&self, name: &str) -> Result<(), TemplarError> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(name).ok_or_else(|| TemplarError::Plugin {
            plugin: name.to_string(),
            message: "unknown plugin".to_string(),
        })?;
        match entry.state {
            PluginState::Initialized | PluginState::Disabled => {
                entry.state = PluginState::Enabled;
                Ok(())
            }
            state => Err(TemplarError::Plugin {
                plugin: name.to_string(),
                message: format!("cannot enable from state {state:?}"),
            }),
        }
    }

    /// Disable a plugin at runtime, waiting (bounded) for its in-flight
    /// hooks to finish.
    pub fn disable(&self, name: &str) -> Result<(), TemplarError> {
        let in_flight = {
            let mut entries = self.entries.write();
            let entry = entries.get_mut(name).ok_or_else(|| TemplarError::Plugin {
                plugin: name.to_string(),
                message: "unknown plugin".to_string(),
            })?;
            if entry.state != PluginState::Enabled {
                return Err(TemplarError::Plugin {
                    plugin: name.to_string(),
                    message: format!("cannot disable from state {:?}", entry.state),
                });
            }
            entry.state = PluginState::Disabled;
            Arc::clone(&entry.in_flight)
        };

        let deadline = Instant::now() + DISABLE_GRACE;
        while in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    /// Disable everything and run plugin shutdowns.
    pub fn shutdown_all(&self) {
        let names: Vec<String> = self.entries.read().keys().cloned().collect();
        for name in names {
            let _ = self.disable(&name);
            if let Some(entry) = self.entries.read().get(&name) {
                entry.plugin.shutdown();
            }
            self.set_state(&name, PluginState::Shutdown, None);
        }
    }

    pub fn statuses(&self) -> Vec<PluginStatus> {
        self.entries
            .read()
            .iter()
            .map(|(name, entry)| PluginStatus {
                name: name.clone(),
                state: entry.state,
                error: entry.error.clone(),
            })
            .collect()
    }

    pub fn state_of(&self, name: &str) -> Option<PluginState> {
        self.entries.read().get(name).map(|e| e.state)
    }

    // ------------------------------------------------------------------
    // Hook fan-out (stable name order, enabled plugins only)
    // ------------------------------------------------------------------

    /// Run ComponentHandler hooks over a freshly scanned component.
    pub fn apply_component_handlers(&self, mut info: ComponentInfo) -> ComponentInfo {
        for (plugin, guard) in self.enabled_plugins() {
            if let Some(handler) = plugin.component_handler() {
                info = handler.transform(info);
            }
            drop(guard);
        }
        info
    }

    /// Run pre-build hooks; the first error aborts the build.
    pub fn run_pre_build(&self, component: &ComponentInfo) -> Result<(), TemplarError> {
        for (plugin, guard) in self.enabled_plugins() {
            if let Some(hook) = plugin.build_hook() {
                if let Err(e) = hook.pre_build(component) {
                    crate::log!("plugin"; "`{}` pre_build: {}", plugin.name(), e);
                    return Err(TemplarError::Plugin {
                        plugin: plugin.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
            drop(guard);
        }
        Ok(())
    }

    /// Run post-build hooks; the first error is returned (build result
    /// stands).
    pub fn run_post_build(&self, result: &mut BuildResult) -> Result<(), TemplarError> {
        for (plugin, guard) in self.enabled_plugins() {
            if let Some(hook) = plugin.build_hook() {
                if let Err(e) = hook.post_build(result) {
                    crate::log!("plugin"; "`{}` post_build: {}", plugin.name(), e);
                    return Err(TemplarError::Plugin {
                        plugin: plugin.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
            drop(guard);
        }
        Ok(())
    }

    /// Extra watcher globs contributed by enabled plugins.
    pub fn watch_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();
        for (plugin, guard) in self.enabled_plugins() {
            if let Some(hook) = plugin.watcher_hook() {
                patterns.extend(hook.watch_patterns());
            }
            drop(guard);
        }
        patterns
    }

    /// Route a `/plugins/{name}/...` request to its ServerHook.
    pub fn handle_request(&self, name: &str, request: &PluginRequest) -> Option<PluginResponse> {
        let (plugin, guard) = {
            let entries = self.entries.read();
            let entry = entries.get(name)?;
            if entry.state != PluginState::Enabled {
                return None;
            }
            (Arc::clone(&entry.plugin), HookGuard::enter(&entry.in_flight))
        };

        let response = plugin.server_hook().and_then(|hook| hook.handle(request));
        drop(guard);
        response
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn enabled_plugins(&self) -> Vec<(Arc<dyn Plugin>, HookGuard)> {
        self.entries
            .read()
            .values()
            .filter(|e| e.state == PluginState::Enabled)
            .map(|e| (Arc::clone(&e.plugin), HookGuard::enter(&e.in_flight)))
            .collect()
    }

    fn set_state(&self, name: &str, state: PluginState, error: Option<String>) {
        if let Some(entry) = self.entries.write().get_mut(name) {
            // Error is terminal.
            if entry.state == PluginState::Error {
                return;
            }
            entry.state = state;
            if error.is_some() {
                entry.error = error;
            }
        }
    }
}

/// RAII in-flight marker so `disable` can drain hooks.
struct HookGuard {
    counter: Arc<AtomicUsize>,
}

impl HookGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Run `initialize` on its own thread with a timeout; panics and
/// overruns both land in `Err`.
fn run_initialize(
    plugin: &Arc<dyn Plugin>,
    config: Option<toml::Value>,
) -> Result<(), TemplarError> {
    let (tx, rx) = crossbeam::channel::bounded(1);
    let plugin = Arc::clone(plugin);
    let name = plugin.name().to_string();

    std::thread::Builder::new()
        .name(format!("templar-plugin-init-{name}"))
        .spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                plugin.initialize(config.as_ref())
            }))
            .unwrap_or_else(|_| {
                Err(TemplarError::Plugin {
                    plugin: plugin.name().to_string(),
                    message: "initialize panicked".to_string(),
                })
            });
            let _ = tx.send(outcome);
        })
        .map_err(|e| TemplarError::Plugin {
            plugin: name.clone(),
            message: format!("failed to spawn init thread: {e}"),
        })?;

    match rx.recv_timeout(INIT_TIMEOUT) {
        Ok(outcome) => outcome,
        Err(_) => Err(TemplarError::Plugin {
            plugin: name,
            message: format!("initialize exceeded {}s timeout", INIT_TIMEOUT.as_secs()),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct TestPlugin {
        name: String,
        fail_init: bool,
        panic_init: bool,
        initialized: AtomicBool,
    }

    impl TestPlugin {
        fn named(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail_init: false,
                panic_init: false,
                initialized: AtomicBool::new(false),
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                fail_init: true,
                ..Self::unwrapped(name)
            })
        }

        fn panicking(name: &str) -> Arc<Self> {
            Arc::new(Self {
                panic_init: true,
                ..Self::unwrapped(name)
            })
        }

        fn unwrapped(name: &str) -> Self {
            Self {
                name: name.to_string(),
                fail_init: false,
                panic_init: false,
                initialized: AtomicBool::new(false),
            }
        }
    }

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn initialize(&self, _config: Option<&toml::Value>) -> Result<(), TemplarError> {
            if self.panic_init {
                panic!("plugin exploded");
            }
            if self.fail_init {
                return Err(TemplarError::Plugin {
                    plugin: self.name.clone(),
                    message: "nope".to_string(),
                });
            }
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(enabled: &[&str]) -> PluginsConfig {
        PluginsConfig {
            enabled: enabled.iter().map(|s| s.to_string()).collect(),
            ..PluginsConfig::default()
        }
    }

    #[test]
    fn test_lifecycle_to_enabled() {
        let manager = PluginManager::new();
        manager.discover(vec![TestPlugin::named("alpha")], &config(&["alpha"]));
        assert_eq!(manager.state_of("alpha"), Some(PluginState::Loaded));

        manager.initialize_all(&config(&["alpha"]));
        assert_eq!(manager.state_of("alpha"), Some(PluginState::Enabled));
    }

    #[test]
    fn test_failed_init_is_isolated() {
        let manager = PluginManager::new();
        let cfg = config(&["good", "bad"]);
        manager.discover(
            vec![TestPlugin::failing("bad"), TestPlugin::named("good")],
            &cfg,
        );
        manager.initialize_all(&cfg);

        assert_eq!(manager.state_of("bad"), Some(PluginState::Error));
        assert_eq!(manager.state_of("good"), Some(PluginState::Enabled));

        let statuses = manager.statuses();
        let bad = statuses.iter().find(|s| s.name == "bad").unwrap();
        assert!(bad.error.as_ref().unwrap().contains("nope"));
    }

    #[test]
    fn test_panicking_init_becomes_error() {
        let manager = PluginManager::new();
        let cfg = config(&["boom"]);
        manager.discover(vec![TestPlugin::panicking("boom")], &cfg);
        manager.initialize_all(&cfg);
        assert_eq!(manager.state_of("boom"), Some(PluginState::Error));
    }

    #[test]
    fn test_error_state_is_terminal() {
        let manager = PluginManager::new();
        let cfg = config(&["bad"]);
        manager.discover(vec![TestPlugin::failing("bad")], &cfg);
        manager.initialize_all(&cfg);

        assert!(manager.enable("bad").is_err());
        assert_eq!(manager.state_of("bad"), Some(PluginState::Error));
    }

    #[test]
    fn test_enable_disable_roundtrip() {
        let manager = PluginManager::new();
        let cfg = config(&["alpha"]);
        manager.discover(vec![TestPlugin::named("alpha")], &cfg);
        manager.initialize_all(&cfg);

        manager.disable("alpha").unwrap();
        assert_eq!(manager.state_of("alpha"), Some(PluginState::Disabled));
        manager.enable("alpha").unwrap();
        assert_eq!(manager.state_of("alpha"), Some(PluginState::Enabled));
    }

    #[test]
    fn test_invalid_names_rejected_at_discovery() {
        let manager = PluginManager::new();
        manager.discover(
            vec![TestPlugin::named("../traversal")],
            &PluginsConfig::default(),
        );
        assert!(manager.state_of("../traversal").is_none());
        assert!(manager.statuses().is_empty());
    }

    #[test]
    fn test_disabled_plugin_skips_hooks() {
        struct Marker {
            called: Arc<AtomicBool>,
        }
        impl Plugin for Marker {
            fn name(&self) -> &str {
                "marker"
            }
            fn component_handler(&self) -> Option<&dyn ComponentHandler> {
                Some(self)
            }
        }
        impl ComponentHandler for Marker {
            fn transform(&self, info: ComponentInfo) -> ComponentInfo {
                self.called.store(true, Ordering::SeqCst);
                info
            }
        }

        let called = Arc::new(AtomicBool::new(false));
        let manager = PluginManager::new();
        let cfg = config(&["marker"]);
        manager.discover(
            vec![Arc::new(Marker {
                called: Arc::clone(&called),
            })],
            &cfg,
        );
        manager.initialize_all(&cfg);

        manager.disable("marker").unwrap();
        manager.apply_component_handlers(ComponentInfo::new("Button", "/p/b.templ"));
        assert!(!called.load(Ordering::SeqCst));

        manager.enable("marker").unwrap();
        manager.apply_component_handlers(ComponentInfo::new("Button", "/p/b.templ"));
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_statuses_ordered_by_name() {
        let manager = PluginManager::new();
        let cfg = PluginsConfig::default();
        manager.discover(
            vec![
                TestPlugin::named("zeta"),
                TestPlugin::named("alpha"),
                TestPlugin::named("mid"),
            ],
            &cfg,
        );
        let names: Vec<_> = manager.statuses().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
