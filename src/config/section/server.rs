//! `[server]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"          # Bind interface (127.0.0.1 = localhost only)
//! port = 8080                 # HTTP port number
//! allowed_origins = []        # Extra WebSocket origins beyond localhost
//! environment = "development"
//! ```
//!
//! Use `host = "0.0.0.0"` to make the server accessible from LAN.

use serde::{Deserialize, Serialize};

/// Preview server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind interface.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub host: String,

    /// HTTP port number.
    pub port: u16,

    /// Additional hosts accepted in the WebSocket `Origin` header.
    /// `localhost`, `127.0.0.1` and `::1` are always accepted.
    pub allowed_origins: Vec<String>,

    /// Environment label reported on /health.
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
            environment: "development".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_server_config() {
        let config = test_parse_config(
            "[server]\nhost = \"0.0.0.0\"\nport = 3000\nallowed_origins = [\"dev.local\"]",
        );
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.allowed_origins, vec!["dev.local"]);
    }

    #[test]
    fn test_server_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.server.environment, "development");
    }

    #[test]
    fn test_server_config_partial_override() {
        let config = test_parse_config("[server]\nport = 9999");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
