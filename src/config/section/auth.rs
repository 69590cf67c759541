//! `[auth]` section configuration (optional).
//!
//! The preview server trusts localhost by default; auth only engages
//! when this section enables it.
//!
//! ```toml
//! [auth]
//! enabled = true
//! mode = "token"
//! token = "dev-secret"
//! localhost_bypass = true
//! ```

use serde::{Deserialize, Serialize};

/// Authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Token,
    Basic,
}

/// Optional access policy enforced ahead of routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub mode: AuthMode,
    /// Bearer token for `mode = "token"`.
    pub token: Option<String>,
    /// Credentials for `mode = "basic"`.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client IPs always allowed (exact match).
    pub allowed_ips: Vec<String>,
    /// Skip auth for loopback clients.
    pub localhost_bypass: bool,
}

#[cfg(test)]
mod tests {
    use super::AuthMode;
    use crate::config::test_parse_config;

    #[test]
    fn test_auth_disabled_by_default() {
        let config = test_parse_config("");
        assert!(!config.auth.enabled);
        assert_eq!(config.auth.mode, AuthMode::None);
    }

    #[test]
    fn test_auth_token_mode() {
        let config = test_parse_config(
            "[auth]\nenabled = true\nmode = \"token\"\ntoken = \"s3cret\"\nlocalhost_bypass = true",
        );
        assert!(config.auth.enabled);
        assert_eq!(config.auth.mode, AuthMode::Token);
        assert_eq!(config.auth.token.as_deref(), Some("s3cret"));
        assert!(config.auth.localhost_bypass);
    }
}
