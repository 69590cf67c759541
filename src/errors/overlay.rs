//! In-browser error overlay rendering.
//!
//! The overlay is injected into preview pages (and pushed over the
//! reload socket) so compile errors show up where the developer is
//! looking. Every user-derived substring is escaped.

use super::{ParsedError, Severity};
use crate::utils::html::escape;

const OVERLAY_STYLE: &str = "\
position:fixed;inset:0;z-index:2147483647;background:rgba(12,12,16,.92);\
color:#e8e8ec;font-family:ui-monospace,monospace;font-size:13px;\
padding:2rem;overflow:auto";

/// Render the full-screen overlay for a component's diagnostics.
///
/// Returns an empty string when there is nothing to show, so callers
/// can append the result unconditionally.
pub fn render_overlay(component: &str, errors: &[ParsedError]) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let mut html = String::with_capacity(512 + errors.len() * 160);
    html.push_str(&format!(
        "<div id=\"templar-error-overlay\" style=\"{OVERLAY_STYLE}\">"
    ));
    html.push_str(&format!(
        "<h1 style=\"color:#ff6b6b;font-size:16px\">Build failed: {}</h1>",
        escape(component)
    ));

    html.push_str("<ul style=\"list-style:none;padding:0\">");
    for err in errors {
        let color = match err.severity {
            Severity::Error => "#ff6b6b",
            Severity::Warning => "#ffd166",
            Severity::Info => "#8ecae6",
        };
        html.push_str(&format!(
            "<li style=\"margin:0 0 1rem\">\
             <span style=\"color:{color}\">{}</span> \
             <span style=\"color:#9a9aa5\">{}:{}:{}</span>\
             <pre style=\"margin:.25rem 0 0;white-space:pre-wrap\">{}</pre>",
            err.severity.label(),
            escape(&err.file.display().to_string()),
            err.line,
            err.column,
            escape(&err.message),
        ));
        if let Some(rule) = &err.rule {
            html.push_str(&format!(
                "<span style=\"color:#6c757d\">rule: {}</span>",
                escape(rule)
            ));
        }
        html.push_str("</li>");
    }
    html.push_str("</ul></div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_errors_render_nothing() {
        assert!(render_overlay("Button", &[]).is_empty());
    }

    #[test]
    fn test_overlay_escapes_user_input() {
        let errors = vec![ParsedError::new(
            "evil.templ",
            1,
            1,
            "<script>alert('xss')</script>",
        )];
        let html = render_overlay("<b>Button</b>", &errors);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&lt;b&gt;Button&lt;/b&gt;"));
    }

    #[test]
    fn test_overlay_includes_location() {
        let errors = vec![ParsedError::new("button.templ", 5, 12, "boom")];
        let html = render_overlay("Button", &errors);
        assert!(html.contains("button.templ"));
        assert!(html.contains("5"));
        assert!(html.contains("boom"));
    }
}
