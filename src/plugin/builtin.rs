//! Builtin plugins.
//!
//! The static registry the manager discovers from. Two ship by
//! default: `css-reload` (watches stylesheet globs so edits trigger
//! reloads) and `component-docs` (serves a parameter reference page
//! under `/plugins/component-docs/`).

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Plugin, PluginRequest, PluginResponse, ServerHook, WatcherHook};
use crate::component::ComponentRegistry;
use crate::errors::TemplarError;
use crate::utils::html::escape;

/// All builtin plugins, ready for discovery.
pub fn all(registry: &Arc<ComponentRegistry>) -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(CssReload::new()),
        Arc::new(ComponentDocs::new(Arc::clone(registry))),
    ]
}

// ============================================================================
// css-reload
// ============================================================================

/// Contributes stylesheet globs to the watcher so CSS edits reach the
/// browser without a templ rebuild.
pub struct CssReload {
    patterns: Mutex<Vec<String>>,
}

impl CssReload {
    pub fn new() -> Self {
        Self {
            patterns: Mutex::new(vec!["**/*.css".to_string()]),
        }
    }
}

impl Default for CssReload {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CssReload {
    fn name(&self) -> &str {
        "css-reload"
    }

    fn initialize(&self, config: Option<&toml::Value>) -> Result<(), TemplarError> {
        if let Some(patterns) = config
            .and_then(|c| c.get("patterns"))
            .and_then(|p| p.as_array())
        {
            let parsed: Vec<String> = patterns
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if !parsed.is_empty() {
                *self.patterns.lock() = parsed;
            }
        }
        Ok(())
    }

    fn watcher_hook(&self) -> Option<&dyn WatcherHook> {
        Some(self)
    }
}

impl WatcherHook for CssReload {
    fn watch_patterns(&self) -> Vec<String> {
        self.patterns.lock().clone()
    }
}

// ============================================================================
// component-docs
// ============================================================================

/// Serves a generated parameter reference for every registered
/// component.
pub struct ComponentDocs {
    registry: Arc<ComponentRegistry>,
}

impl ComponentDocs {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    fn render_index(&self) -> String {
        let mut components = self.registry.all();
        components.sort_by(|a, b| a.name.cmp(&b.name));

        let mut html = String::from(
            "<!DOCTYPE html><html><head><title>Component reference</title></head><body>\
             <h1>Component reference</h1>",
        );
        for info in &components {
            html.push_str(&format!(
                "<h2>{}</h2><p>package <code>{}</code></p><table border=\"1\">\
                 <tr><th>parameter</th><th>type</th><th>default</th></tr>",
                escape(&info.name),
                escape(&info.package),
            ));
            for param in &info.parameters {
                html.push_str(&format!(
                    "<tr><td>{}</td><td><code>{}</code></td><td>{}</td></tr>",
                    escape(&param.name),
                    escape(&param.type_name),
                    escape(param.default.as_deref().unwrap_or("—")),
                ));
            }
            html.push_str("</table>");
        }
        html.push_str("</body></html>");
        html
    }
}

impl Plugin for ComponentDocs {
    fn name(&self) -> &str {
        "component-docs"
    }

    fn server_hook(&self) -> Option<&dyn ServerHook> {
        Some(self)
    }
}

impl ServerHook for ComponentDocs {
    fn handle(&self, request: &PluginRequest) -> Option<PluginResponse> {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/" | "") => Some(PluginResponse::html(self.render_index())),
            ("GET", "/components.json") => {
                let components = self.registry.all();
                serde_json::to_vec(&components).ok().map(PluginResponse::json)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentInfo, Parameter};
    use crate::config::PluginsConfig;
    use crate::plugin::{PluginManager, PluginState};

    fn registry_with_button() -> Arc<ComponentRegistry> {
        let registry = Arc::new(ComponentRegistry::new());
        let mut info = ComponentInfo::new("Button", "/p/button.templ");
        info.content_hash = "aa".to_string();
        info.parameters
            .push(Parameter::required("text", "string"));
        registry.register(info);
        registry
    }

    #[test]
    fn test_builtins_enable_through_manager() {
        let registry = registry_with_button();
        let manager = PluginManager::new();
        let config = PluginsConfig {
            enabled: vec!["css-reload".to_string(), "component-docs".to_string()],
            ..PluginsConfig::default()
        };
        manager.discover(all(&registry), &config);
        manager.initialize_all(&config);

        assert_eq!(manager.state_of("css-reload"), Some(PluginState::Enabled));
        assert_eq!(
            manager.state_of("component-docs"),
            Some(PluginState::Enabled)
        );
        assert_eq!(manager.watch_patterns(), vec!["**/*.css".to_string()]);
    }

    #[test]
    fn test_css_reload_patterns_configurable() {
        let plugin = CssReload::new();
        let config: toml::Value = "patterns = [\"assets/**/*.scss\"]".parse().unwrap();
        plugin.initialize(Some(&config)).unwrap();
        assert_eq!(
            plugin.watch_patterns(),
            vec!["assets/**/*.scss".to_string()]
        );
    }

    #[test]
    fn test_component_docs_renders_parameters() {
        let docs = ComponentDocs::new(registry_with_button());
        let response = docs
            .handle(&PluginRequest {
                method: "GET".to_string(),
                path: "/".to_string(),
                query: None,
            })
            .unwrap();

        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("Button"));
        assert!(body.contains("text"));
        assert!(body.contains("string"));
    }

    #[test]
    fn test_component_docs_unknown_path_is_none() {
        let docs = ComponentDocs::new(registry_with_button());
        assert!(
            docs.handle(&PluginRequest {
                method: "GET".to_string(),
                path: "/nope".to_string(),
                query: None,
            })
            .is_none()
        );
    }
}
