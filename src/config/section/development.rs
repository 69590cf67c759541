//! `[development]` section configuration.
//!
//! ```toml
//! [development]
//! hot_reload = true
//! css_injection = true
//! error_overlay = true
//! ```

use serde::{Deserialize, Serialize};

/// Developer-experience toggles for serve mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevelopmentConfig {
    /// Inject the livereload client and broadcast rebuild events.
    pub hot_reload: bool,

    /// Swap stylesheets in place instead of reloading the page.
    pub css_injection: bool,

    /// Render compile errors as a full-page overlay.
    pub error_overlay: bool,

    /// Debounce window for filesystem events, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for DevelopmentConfig {
    fn default() -> Self {
        Self {
            hot_reload: true,
            css_injection: true,
            error_overlay: true,
            debounce_ms: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_development_defaults() {
        let config = test_parse_config("");
        assert!(config.development.hot_reload);
        assert!(config.development.error_overlay);
        assert_eq!(config.development.debounce_ms, 300);
    }

    #[test]
    fn test_development_overrides() {
        let config = test_parse_config("[development]\nhot_reload = false\ndebounce_ms = 500");
        assert!(!config.development.hot_reload);
        assert_eq!(config.development.debounce_ms, 500);
    }
}
