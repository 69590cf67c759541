//! URL path validation and static file resolution.
//!
//! Component names in routes share the registry's name rule, so a
//! validated segment can never carry traversal sequences. Static paths
//! are canonicalized and verified to stay under the configured root
//! after symlink resolution.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::component::validate_name;
use crate::errors::TemplarError;

/// Outcome of static path resolution.
#[derive(Debug)]
pub enum StaticPath {
    File(PathBuf),
    /// Path does not exist under the root.
    NotFound,
    /// Path resolves outside the root (403).
    Forbidden,
}

/// Percent-decode a path segment.
pub fn decode_segment(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw)
        .decode_utf8()
        .unwrap_or_else(|_| Cow::Borrowed(raw))
}

/// Decode and validate a component name from a URL path segment.
///
/// Rejects traversal sequences (`..`, absolute paths, URL-encoded
/// variants) with a validation error mapped to 400.
pub fn component_name_from_path(segment: &str) -> Result<String, TemplarError> {
    let decoded = decode_segment(segment);

    if decoded.contains("..") || decoded.contains('/') || decoded.contains('\\') {
        return Err(TemplarError::validation(format!(
            "path traversal rejected: `{decoded}`"
        )));
    }
    if !validate_name(&decoded) {
        return Err(TemplarError::validation(format!(
            "invalid component name: `{decoded}`"
        )));
    }
    Ok(decoded.into_owned())
}

/// Resolve a `/static/...` remainder against the static root.
///
/// Every path reaching the filesystem begins with the resolved root;
/// symlinked escapes surface as [`StaticPath::Forbidden`].
pub fn resolve_static(rest: &str, static_root: &Path) -> StaticPath {
    let decoded = decode_segment(rest);
    let relative = decoded.split('?').next().unwrap_or(&decoded).trim_matches('/');

    // Cheap rejections before touching the filesystem.
    if relative.contains("..") || Path::new(relative).is_absolute() {
        return StaticPath::Forbidden;
    }

    let candidate = static_root.join(relative);
    let Ok(root) = static_root.canonicalize() else {
        return StaticPath::NotFound;
    };
    let Ok(canonical) = candidate.canonicalize() else {
        return StaticPath::NotFound;
    };

    if !canonical.starts_with(&root) {
        return StaticPath::Forbidden;
    }
    if canonical.is_file() {
        StaticPath::File(canonical)
    } else {
        StaticPath::NotFound
    }
}

// ============================================================================
// Tests
// ============================================================================
