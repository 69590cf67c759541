//! Plugin capability interfaces.
//!
//! Plugins are statically registered values implementing [`Plugin`]
//! plus any subset of the capability traits. "Discovery" filters the
//! static registry through the configured lists; there is no runtime
//! code loading.

use crate::build::BuildResult;
use crate::component::ComponentInfo;
use crate::errors::TemplarError;

/// Lifecycle states.
///
/// ```text
/// discovered → loaded → initialized → enabled ⇄ disabled → shutdown
///                      (error is terminal from any state)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Discovered,
    Loaded,
    Initialized,
    Enabled,
    Disabled,
    Shutdown,
    Error,
}

/// Base plugin interface; capability accessors default to `None`.
pub trait Plugin: Send + Sync {
    /// Unique name: alphanumeric, dash, underscore.
    fn name(&self) -> &str;

    /// One-time setup; runs under the manager's init timeout. The
    /// plugin's table from `[plugins.configurations]` is passed when
    /// present.
    fn initialize(&self, config: Option<&toml::Value>) -> Result<(), TemplarError> {
        let _ = config;
        Ok(())
    }

    fn shutdown(&self) {}

    fn component_handler(&self) -> Option<&dyn ComponentHandler> {
        None
    }

    fn build_hook(&self) -> Option<&dyn BuildHook> {
        None
    }

    fn server_hook(&self) -> Option<&dyn ServerHook> {
        None
    }

    fn watcher_hook(&self) -> Option<&dyn WatcherHook> {
        None
    }
}

/// Transform scanned components before registration.
pub trait ComponentHandler: Send + Sync {
    fn transform(&self, info: ComponentInfo) -> ComponentInfo;
}

/// Observe builds around each compile.
pub trait BuildHook: Send + Sync {
    fn pre_build(&self, component: &ComponentInfo) -> Result<(), TemplarError>;
    fn post_build(&self, result: &mut BuildResult) -> Result<(), TemplarError>;
}

/// Serve additional HTTP routes under `/plugins/{name}/`.
pub trait ServerHook: Send + Sync {
    /// `request.path` is relative to the plugin's prefix. Returning
    /// `None` yields a 404 from the host.
    fn handle(&self, request: &PluginRequest) -> Option<PluginResponse>;
}

/// Contribute extra glob patterns to the watcher.
pub trait WatcherHook: Send + Sync {
    fn watch_patterns(&self) -> Vec<String>;
}

/// HTTP request slice handed to [`ServerHook`]s.
#[derive(Debug, Clone)]
pub struct PluginRequest {
    pub method: String,
    /// Path under the plugin prefix, always starting with `/`.
    pub path: String,
    pub query: Option<String>,
}

/// Response produced by a [`ServerHook`].
#[derive(Debug, Clone)]
pub struct PluginResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl PluginResponse {
    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: "application/json; charset=utf-8".to_string(),
            body: body.into(),
        }
    }
}

/// Validate a plugin name: alphanumeric plus dash/underscore, no
/// traversal characters.
pub fn validate_plugin_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_plugin_name() {
        assert!(validate_plugin_name("css-reload"));
        assert!(validate_plugin_name("a11y_audit"));
        assert!(!validate_plugin_name(""));
        assert!(!validate_plugin_name("../evil"));
        assert!(!validate_plugin_name("has space"));
        assert!(!validate_plugin_name("dot.dot"));
    }
}
