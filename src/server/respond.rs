//! HTTP response helpers.

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

use crate::errors::TemplarError;

pub const HTML: &str = "text/html; charset=utf-8";
pub const JSON: &str = "application/json; charset=utf-8";
pub const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
pub const PLAIN: &str = "text/plain; charset=utf-8";

pub fn make_header(key: &str, value: &str) -> Header {
    Header::from_bytes(key.as_bytes(), value.as_bytes()).expect("static header must parse")
}

pub fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

pub fn send_html(request: Request, status: u16, body: String) -> Result<()> {
    send_body(request, status, HTML, body.into_bytes())
}

/// Machine-facing error body carrying the taxonomy tag.
pub fn send_error(request: Request, status: u16, tag: &str, message: &str) -> Result<()> {
    let body = serde_json::json!({
        "error": tag,
        "message": message,
    });
    send_body(request, status, JSON, body.to_string().into_bytes())
}

/// Map a typed error onto its HTTP status.
pub fn send_templar_error(request: Request, error: &TemplarError) -> Result<()> {
    let status = match error {
        TemplarError::Validation(_) => 400,
        TemplarError::Plugin { .. } => 500,
        TemplarError::Build { .. } => 500,
        TemplarError::TransientIo { .. } => 500,
        TemplarError::Fatal(_) => 500,
    };
    send_error(request, status, error.tag(), &error.to_string())
}

pub fn respond_not_found(request: Request, what: &str) -> Result<()> {
    send_error(request, 404, "validation", &format!("unknown {what}"))
}

pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

/// Loading page shown while the initial scan runs.
pub fn respond_loading(request: Request) -> Result<()> {
    send_html(request, 200, crate::embed::LOADING_HTML.to_string())
}

