//! Optional access-control middleware.
//!
//! Runs ahead of routing when `[auth]` enables it. The dev-server
//! trust model is localhost-first: loopback clients bypass credential
//! checks when `localhost_bypass` is set.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::net::SocketAddr;

use crate::config::{AuthConfig, AuthMode};
use crate::errors::TemplarError;

/// Check a request against the auth policy. `Err` maps to 403.
pub fn authorize(
    config: &AuthConfig,
    remote_addr: Option<&SocketAddr>,
    authorization: Option<&str>,
) -> Result<(), TemplarError> {
    if !config.enabled {
        return Ok(());
    }

    if config.localhost_bypass && remote_addr.map(|a| a.ip().is_loopback()).unwrap_or(false) {
        return Ok(());
    }

    if let Some(addr) = remote_addr {
        let ip = addr.ip().to_string();
        if config.allowed_ips.iter().any(|allowed| allowed == &ip) {
            return Ok(());
        }
    }

    match config.mode {
        AuthMode::None => Err(deny("client address not allowed")),
        AuthMode::Token => {
            let expected = config.token.as_deref().unwrap_or_default();
            match bearer_token(authorization) {
                Some(token) if !expected.is_empty() && token == expected => Ok(()),
                _ => Err(deny("invalid or missing token")),
            }
        }
        AuthMode::Basic => {
            let expected_user = config.username.as_deref().unwrap_or_default();
            let expected_pass = config.password.as_deref().unwrap_or_default();
            match basic_credentials(authorization) {
                Some((user, pass))
                    if !expected_user.is_empty()
                        && user == expected_user
                        && pass == expected_pass =>
                {
                    Ok(())
                }
                _ => Err(deny("invalid or missing credentials")),
            }
        }
    }
}

fn deny(reason: &str) -> TemplarError {
    TemplarError::validation(format!("unauthorized: {reason}"))
}

fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    authorization?.strip_prefix("Bearer ").map(str::trim)
}

fn basic_credentials(authorization: Option<&str>) -> Option<(String, String)> {
    let encoded = authorization?.strip_prefix("Basic ")?.trim();
    let decoded = BASE64.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:54321".parse().unwrap()
    }

    fn remote() -> SocketAddr {
        "203.0.113.9:54321".parse().unwrap()
    }

    #[test]
    fn test_disabled_auth_allows_everything() {
        let config = AuthConfig::default();
        assert!(authorize(&config, Some(&remote()), None).is_ok());
    }

    #[test]
    fn test_localhost_bypass() {
        let config = AuthConfig {
            enabled: true,
            mode: AuthMode::Token,
            token: Some("secret".to_string()),
            localhost_bypass: true,
            ..AuthConfig::default()
        };
        assert!(authorize(&config, Some(&loopback()), None).is_ok());
        assert!(authorize(&config, Some(&remote()), None).is_err());
    }

    #[test]
    fn test_token_mode() {
        let config = AuthConfig {
            enabled: true,
            mode: AuthMode::Token,
            token: Some("secret".to_string()),
            ..AuthConfig::default()
        };
        assert!(authorize(&config, Some(&remote()), Some("Bearer secret")).is_ok());
        assert!(authorize(&config, Some(&remote()), Some("Bearer wrong")).is_err());
        assert!(authorize(&config, Some(&remote()), None).is_err());
    }

    #[test]
    fn test_basic_mode() {
        let config = AuthConfig {
            enabled: true,
            mode: AuthMode::Basic,
            username: Some("dev".to_string()),
            password: Some("hunter2".to_string()),
            ..AuthConfig::default()
        };
        // "dev:hunter2"
        let header = format!("Basic {}", BASE64.encode("dev:hunter2"));
        assert!(authorize(&config, Some(&remote()), Some(&header)).is_ok());

        let wrong = format!("Basic {}", BASE64.encode("dev:wrong"));
        assert!(authorize(&config, Some(&remote()), Some(&wrong)).is_err());
        assert!(authorize(&config, Some(&remote()), Some("Basic ???")).is_err());
    }

    #[test]
    fn test_ip_allowlist() {
        let config = AuthConfig {
            enabled: true,
            mode: AuthMode::None,
            allowed_ips: vec!["203.0.113.9".to_string()],
            ..AuthConfig::default()
        };
        assert!(authorize(&config, Some(&remote()), None).is_ok());
        assert!(authorize(&config, Some(&loopback()), None).is_err());
    }
}
