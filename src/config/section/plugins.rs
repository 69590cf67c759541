//! `[plugins]` section configuration.
//!
//! ```toml
//! [plugins]
//! enabled = ["css-reload"]
//! disabled = []
//! discovery_paths = [".templar/plugins"]
//!
//! [plugins.configurations.css-reload]
//! patterns = ["**/*.css"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Plugin discovery and activation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Plugins to enable after initialization.
    pub enabled: Vec<String>,

    /// Plugins kept loaded but disabled.
    pub disabled: Vec<String>,

    /// Extra directories searched for plugin manifests.
    pub discovery_paths: Vec<PathBuf>,

    /// Free-form per-plugin configuration tables.
    pub configurations: BTreeMap<String, toml::Value>,
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_plugins_defaults_empty() {
        let config = test_parse_config("");
        assert!(config.plugins.enabled.is_empty());
        assert!(config.plugins.discovery_paths.is_empty());
    }

    #[test]
    fn test_plugins_config() {
        let config = test_parse_config(
            "[plugins]\nenabled = [\"css-reload\"]\n\n[plugins.configurations.css-reload]\npatterns = [\"**/*.css\"]",
        );
        assert_eq!(config.plugins.enabled, vec!["css-reload"]);
        assert!(config.plugins.configurations.contains_key("css-reload"));
    }
}
