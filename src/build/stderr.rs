//! Compiler stderr parsing.
//!
//! Recognizes the common `file:line:col: message` shape emitted by
//! templ and go, with a severity prefix when present and an optional
//! trailing `(rule)` tag. Unrecognized stderr collapses into a single
//! position-less diagnostic so nothing is silently lost.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{ParsedError, Severity};

static DIAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>[^\s:][^:]*):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?:(?P<sev>error|warning|info):\s*)?(?P<msg>.+?)(?:\s+\((?P<rule>[a-z0-9_-]+)\))?$",
    )
    .unwrap()
});

/// Parse compiler stderr into structured diagnostics.
pub fn parse_stderr(component_file: &Path, stderr: &str) -> Vec<ParsedError> {
    let mut errors = Vec::new();

    for line in stderr.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(cap) = DIAG_RE.captures(line) {
            let severity = match cap.name("sev").map(|m| m.as_str()) {
                Some("warning") => Severity::Warning,
                Some("info") => Severity::Info,
                _ => Severity::Error,
            };
            let mut err = ParsedError::new(
                cap.name("file").map(|m| m.as_str()).unwrap_or_default(),
                cap.name("line")
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0),
                cap.name("col")
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0),
                cap.name("msg").map(|m| m.as_str()).unwrap_or_default(),
            )
            .with_severity(severity);
            if let Some(rule) = cap.name("rule") {
                err = err.with_rule(rule.as_str());
            }
            errors.push(err);
        }
    }

    if errors.is_empty() && !stderr.trim().is_empty() {
        errors.push(ParsedError::new(component_file, 0, 0, stderr.trim()));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_diagnostic() {
        let errs = parse_stderr(
            Path::new("b.templ"),
            "components/button.templ:14:9: error: unexpected token `}`\n",
        );
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].file, Path::new("components/button.templ"));
        assert_eq!(errs[0].line, 14);
        assert_eq!(errs[0].column, 9);
        assert_eq!(errs[0].severity, Severity::Error);
        assert!(errs[0].message.contains("unexpected token"));
    }

    #[test]
    fn test_parse_without_severity_defaults_to_error() {
        let errs = parse_stderr(Path::new("b.templ"), "button.templ:3:1: something broke\n");
        assert_eq!(errs[0].severity, Severity::Error);
    }

    #[test]
    fn test_parse_warning_and_rule() {
        let errs = parse_stderr(
            Path::new("b.templ"),
            "button.templ:7:2: warning: unused import (unused-import)\n",
        );
        assert_eq!(errs[0].severity, Severity::Warning);
        assert_eq!(errs[0].rule.as_deref(), Some("unused-import"));
    }

    #[test]
    fn test_parse_line_only_position() {
        let errs = parse_stderr(Path::new("b.templ"), "main.go:42: undefined: Button\n");
        assert_eq!(errs[0].line, 42);
        assert_eq!(errs[0].column, 0);
    }

    #[test]
    fn test_unstructured_stderr_kept_whole() {
        let errs = parse_stderr(Path::new("b.templ"), "panic: something very bad\n");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].file, Path::new("b.templ"));
        assert_eq!(errs[0].line, 0);
        assert!(errs[0].message.contains("panic"));
    }

    #[test]
    fn test_empty_stderr_yields_nothing() {
        assert!(parse_stderr(Path::new("b.templ"), "  \n").is_empty());
    }

    #[test]
    fn test_multiple_diagnostics() {
        let errs = parse_stderr(
            Path::new("b.templ"),
            "a.templ:1:1: error: first\nb.templ:2:2: warning: second\n",
        );
        assert_eq!(errs.len(), 2);
    }
}
