//! Path normalization helpers.

use std::path::{Component, Path, PathBuf};

/// Normalize a path without touching the filesystem.
///
/// Resolves `.` and `..` components lexically. Used to canonicalize
/// watcher event paths so map lookups are reliable even when notify
/// reports the same file under slightly different spellings.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(Component::ParentDir);
                }
            }
            other => result.push(other),
        }
    }
    result
}

/// Check whether `path` stays under `root` after canonicalization.
///
/// Both paths are resolved through the filesystem, so symlinked escapes
/// are caught as well. Returns the canonical path when it is confined.
pub fn confine_to_root(path: &Path, root: &Path) -> Option<PathBuf> {
    let canonical = path.canonicalize().ok()?;
    let root_canonical = root.canonicalize().ok()?;
    canonical.starts_with(&root_canonical).then_some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_removes_dot_segments() {
        assert_eq!(
            normalize_path(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
    }

    #[test]
    fn test_normalize_keeps_leading_parent() {
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_confine_rejects_escape() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("static");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();

        let escape = root.join("../secret.txt");
        assert!(confine_to_root(&escape, &root).is_none());
    }

    #[test]
    fn test_confine_accepts_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("static");
        std::fs::create_dir_all(&root).unwrap();
        let file = root.join("app.css");
        std::fs::write(&file, "body{}").unwrap();

        assert!(confine_to_root(&file, &root).is_some());
    }
}
