//! WebSocket upgrade with origin validation.
//!
//! The upgrade rides the HTTP socket: tiny_http hands back the raw
//! stream after the 101 response and tungstenite takes over framing.
//! Origins are checked before any message is read; localhost origins
//! are pinned to the bound port.

use tiny_http::{Request, Response, StatusCode};
use tungstenite::handshake::derive_accept_key;
use tungstenite::protocol::{Role, WebSocket};
use url::Url;

use crate::server::respond::make_header;

/// The stream type tiny_http yields on upgrade.
pub type UpgradedStream = Box<dyn tiny_http::ReadWrite + Send>;

/// Hosts always accepted regardless of configuration.
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// Validate a WebSocket `Origin` header value.
///
/// Accepts only parseable http/https URLs whose host is localhost (on
/// the bound port) or on the configured allowlist. Allowlist entries
/// match by host, or by host:port when they carry a port.
pub fn origin_allowed(origin: Option<&str>, allowed: &[String], bound_port: u16) -> bool {
    let Some(origin) = origin else {
        return false;
    };
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };

    if LOCAL_HOSTS.contains(&host) {
        // Default scheme port counts as a match too.
        let origin_port = url.port_or_known_default().unwrap_or(bound_port);
        return origin_port == bound_port;
    }

    allowed.iter().any(|entry| {
        match entry.split_once(':') {
            Some((allowed_host, allowed_port)) => {
                host == allowed_host
                    && url
                        .port_or_known_default()
                        .map(|p| p.to_string() == allowed_port)
                        .unwrap_or(false)
            }
            None => host == entry,
        }
    })
}

/// Read a header value (case-insensitive field match).
pub fn header_value(request: &Request, field: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(field))
        .map(|h| h.value.to_string())
}

/// Perform the upgrade handshake and wrap the raw stream.
///
/// The caller has already validated the origin. Consumes the request;
/// on a malformed handshake the request is answered with 400.
pub fn upgrade(request: Request) -> Result<WebSocket<UpgradedStream>, anyhow::Error> {
    let Some(key) = header_value(&request, "Sec-WebSocket-Key") else {
        let _ = request.respond(Response::empty(StatusCode(400)));
        anyhow::bail!("missing Sec-WebSocket-Key");
    };

    let accept = derive_accept_key(key.trim().as_bytes());
    let response = Response::empty(StatusCode(101))
        .with_header(make_header("Upgrade", "websocket"))
        .with_header(make_header("Connection", "Upgrade"))
        .with_header(make_header("Sec-WebSocket-Accept", &accept));

    let stream = request.upgrade("websocket", response);
    Ok(WebSocket::from_raw_socket(stream, Role::Server, None))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PORT: u16 = 8080;

    fn allowed(origin: &str) -> bool {
        origin_allowed(Some(origin), &[], PORT)
    }

    #[test]
    fn test_localhost_origins_accepted() {
        assert!(allowed("http://localhost:8080"));
        assert!(allowed("http://127.0.0.1:8080"));
        assert!(allowed("http://[::1]:8080"));
        assert!(allowed("https://localhost:8080"));
    }

    #[test]
    fn test_foreign_origin_rejected() {
        assert!(!allowed("http://evil.example.com"));
        assert!(!allowed("http://evil.example.com:8080"));
    }

    #[test]
    fn test_wrong_port_rejected() {
        assert!(!allowed("http://localhost:9999"));
        // Port 80 implied, not the bound port.
        assert!(!allowed("http://localhost"));
    }

    #[test]
    fn test_missing_or_garbage_origin_rejected() {
        assert!(!origin_allowed(None, &[], PORT));
        assert!(!allowed("not a url"));
        assert!(!allowed("ftp://localhost:8080"));
        assert!(!allowed("javascript:alert(1)"));
    }

    #[test]
    fn test_allowlist_by_host() {
        let extra = vec!["dev.example.test".to_string()];
        assert!(origin_allowed(
            Some("http://dev.example.test:3000"),
            &extra,
            PORT
        ));
        assert!(origin_allowed(Some("https://dev.example.test"), &extra, PORT));
        assert!(!origin_allowed(Some("http://other.test"), &extra, PORT));
    }

    #[test]
    fn test_allowlist_with_port_pins_port() {
        let extra = vec!["dev.example.test:3000".to_string()];
        assert!(origin_allowed(
            Some("http://dev.example.test:3000"),
            &extra,
            PORT
        ));
        assert!(!origin_allowed(
            Some("http://dev.example.test:4000"),
            &extra,
            PORT
        ));
    }
}
