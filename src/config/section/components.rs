//! `[components]` section configuration.
//!
//! ```toml
//! [components]
//! scan_paths = ["components", "views"]
//! exclude_patterns = ["**/node_modules/**", "**/*_test.templ"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Component discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentsConfig {
    /// Directories scanned for component sources, relative to the
    /// project root.
    pub scan_paths: Vec<PathBuf>,

    /// Glob patterns excluded from scanning and watching.
    pub exclude_patterns: Vec<String>,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            scan_paths: vec![PathBuf::from("components")],
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
                "**/*_templ.go".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::path::PathBuf;

    #[test]
    fn test_components_config() {
        let config =
            test_parse_config("[components]\nscan_paths = [\"ui\", \"views\"]\nexclude_patterns = []");
        assert_eq!(
            config.components.scan_paths,
            vec![PathBuf::from("ui"), PathBuf::from("views")]
        );
        assert!(config.components.exclude_patterns.is_empty());
    }

    #[test]
    fn test_components_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.components.scan_paths, vec![PathBuf::from("components")]);
        assert!(!config.components.exclude_patterns.is_empty());
    }
}
