//! Error taxonomy and compile diagnostics.
//!
//! `TemplarError` classifies failures across the public contracts
//! (validation, transient I/O, build, plugin, fatal); the HTTP layer
//! maps variants to status codes. `ParsedError` is the structured form
//! of a single compiler/scanner diagnostic, accumulated per component
//! by the [`ErrorCollector`].

mod collector;
mod overlay;

pub use collector::ErrorCollector;
pub use overlay::render_overlay;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// TemplarError
// ============================================================================

/// Top-level error taxonomy.
///
/// Validation errors are surfaced to the caller and never retried;
/// transient I/O is retried with backoff inside the owning component
/// before it ever reaches this type.
#[derive(Debug, Error)]
pub enum TemplarError {
    /// Input violating a contract (bad name, traversal, oversize payload).
    #[error("validation: {0}")]
    Validation(String),

    /// Filesystem or network failure after retry exhaustion.
    #[error("io: {context}")]
    TransientIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Compiler exited non-zero; structured diagnostics attached.
    #[error("build failed for `{component}`")]
    Build {
        component: String,
        errors: Vec<ParsedError>,
    },

    /// Plugin failure; isolated to the plugin, host continues.
    #[error("plugin `{plugin}`: {message}")]
    Plugin { plugin: String, message: String },

    /// Unrecoverable condition; triggers graceful shutdown.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl TemplarError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::TransientIo {
            context: context.into(),
            source,
        }
    }

    /// Machine-facing taxonomy tag for JSON error bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::TransientIo { .. } => "transient_io",
            Self::Build { .. } => "build",
            Self::Plugin { .. } => "plugin",
            Self::Fatal(_) => "fatal",
        }
    }
}

// ============================================================================
// ParsedError
// ============================================================================

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// A single structured compiler or scanner diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedError {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
    /// Lint/rule identifier when the tool reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl ParsedError {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            severity: Severity::Error,
            message: message.into(),
            rule: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl std::fmt::Display for ParsedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file.display(),
            self.line,
            self.column,
            self.severity.label(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_tags() {
        assert_eq!(TemplarError::validation("x").tag(), "validation");
        assert_eq!(
            TemplarError::Build {
                component: "Button".into(),
                errors: vec![],
            }
            .tag(),
            "build"
        );
    }

    #[test]
    fn test_parsed_error_display() {
        let err = ParsedError::new("components/button.templ", 5, 12, "unexpected token");
        assert_eq!(
            err.to_string(),
            "components/button.templ:5:12: error: unexpected token"
        );
    }
}
