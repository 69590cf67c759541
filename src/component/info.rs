//! Component metadata extracted by the scanner.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// A declared template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub optional: bool,
    /// Default value expression, verbatim from the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    pub fn required(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            optional: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self.optional = true;
        self
    }
}

/// Everything the runtime knows about one declared component.
///
/// Created on first scan, mutated only by re-scan, removed when its
/// source file disappears. `content_hash` fully determines build cache
/// lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Unique identifier within the registry (alphanumeric + underscore).
    pub name: String,
    /// Grouping namespace, from the source file's `package` line.
    pub package: String,
    /// Absolute source path, validated against traversal by the scanner.
    pub file_path: PathBuf,
    /// Declared parameters, in source order.
    pub parameters: Vec<Parameter>,
    /// Import strings from the source file.
    pub imports: FxHashSet<String>,
    /// Names of components this one references.
    pub dependencies: FxHashSet<String>,
    /// Source file mtime at scan time.
    pub last_modified: SystemTime,
    /// Hex blake3 digest of the source bytes.
    pub content_hash: String,
}

impl ComponentInfo {
    pub fn new(name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            package: String::new(),
            file_path: file_path.into(),
            parameters: Vec::new(),
            imports: FxHashSet::default(),
            dependencies: FxHashSet::default(),
            last_modified: SystemTime::UNIX_EPOCH,
            content_hash: String::new(),
        }
    }
}

/// Validate a component name: `[A-Za-z_][A-Za-z0-9_]*`.
///
/// The same rule gates registry names and URL path segments on the
/// preview server, so a name that registers is always addressable and
/// an address that validates can never smuggle traversal sequences.
pub fn validate_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_identifiers() {
        assert!(validate_name("Button"));
        assert!(validate_name("nav_bar_2"));
        assert!(validate_name("_private"));
    }

    #[test]
    fn test_validate_name_rejects_garbage() {
        assert!(!validate_name(""));
        assert!(!validate_name("2cool"));
        assert!(!validate_name("../etc/passwd"));
        assert!(!validate_name("Button-primary"));
        assert!(!validate_name("a b"));
    }

    #[test]
    fn test_parameter_with_default_is_optional() {
        let p = Parameter::required("variant", "string").with_default("\"primary\"");
        assert!(p.optional);
        assert_eq!(p.default.as_deref(), Some("\"primary\""));
    }
}
