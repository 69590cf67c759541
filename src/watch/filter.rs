//! Event filtering: include/exclude globs and symlink loop tracking.
//!
//! Filtering happens on raw events, before debouncing, so excluded
//! paths never occupy pending slots.

use globset::{Glob, GlobSet, GlobSetBuilder};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

/// A watched root with its include patterns.
struct Root {
    path: PathBuf,
    /// Empty set = everything under the root matches.
    include: Option<GlobSet>,
}

/// Path filter shared by the watcher run loop.
pub struct PathFilter {
    roots: Vec<Root>,
    exclude: GlobSet,
    /// (device, inode) pairs of directories already watched, for
    /// symlink loop detection.
    seen_dirs: FxHashSet<(u64, u64)>,
}

impl PathFilter {
    pub fn new(exclude_patterns: &[String]) -> anyhow::Result<Self> {
        Ok(Self {
            roots: Vec::new(),
            exclude: build_globset(exclude_patterns)?,
            seen_dirs: FxHashSet::default(),
        })
    }

    /// Register a root with its include patterns.
    pub fn add_root(&mut self, root: &Path, include_patterns: &[String]) -> anyhow::Result<()> {
        let include = if include_patterns.is_empty() {
            None
        } else {
            Some(build_globset(include_patterns)?)
        };
        self.roots.push(Root {
            path: root.to_path_buf(),
            include,
        });
        Ok(())
    }

    pub fn remove_root(&mut self, root: &Path) {
        self.roots.retain(|r| r.path != root);
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|r| r.path.clone()).collect()
    }

    /// Decide whether a raw event path should be processed.
    ///
    /// Exclude wins over include. Temp/editor artifacts are always
    /// excluded.
    pub fn matches(&self, path: &Path) -> bool {
        if is_temp_file(path) {
            return false;
        }

        for root in &self.roots {
            let Ok(relative) = path.strip_prefix(&root.path) else {
                continue;
            };
            if self.exclude.is_match(relative) || self.exclude.is_match(path) {
                return false;
            }
            match &root.include {
                None => return true,
                Some(include) if include.is_match(relative) => return true,
                Some(_) => {}
            }
        }
        false
    }

    /// Record a directory's identity; returns `false` when it was seen
    /// before (symlink loop).
    pub fn track_dir(&mut self, dir: &Path) -> bool {
        match dir_identity(dir) {
            Some(id) => self.seen_dirs.insert(id),
            // Identity unavailable (platform or I/O): let it through.
            None => true,
        }
    }

    pub fn clear(&mut self) {
        self.roots.clear();
        self.seen_dirs.clear();
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

#[cfg(unix)]
fn dir_identity(dir: &Path) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(dir).ok()?;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dir_identity(dir: &Path) -> Option<(u64, u64)> {
    // No stable inode identity; canonical-path dedup happens upstream.
    let _ = dir;
    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str]) -> PathFilter {
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let mut f = PathFilter::new(&exclude).unwrap();
        f.add_root(Path::new("/proj/components"), &include).unwrap();
        f
    }

    #[test]
    fn test_include_glob_matches() {
        let f = filter(&["**/*.templ"], &[]);
        assert!(f.matches(Path::new("/proj/components/button.templ")));
        assert!(f.matches(Path::new("/proj/components/nested/card.templ")));
        assert!(!f.matches(Path::new("/proj/components/readme.md")));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let f = filter(&["**/*.templ"], &["**/vendor/**"]);
        assert!(!f.matches(Path::new("/proj/components/vendor/lib.templ")));
        assert!(f.matches(Path::new("/proj/components/button.templ")));
    }

    #[test]
    fn test_outside_root_never_matches() {
        let f = filter(&["**/*.templ"], &[]);
        assert!(!f.matches(Path::new("/etc/passwd.templ")));
    }

    #[test]
    fn test_empty_include_matches_everything_under_root() {
        let f = filter(&[], &[]);
        assert!(f.matches(Path::new("/proj/components/anything.xyz")));
    }

    #[test]
    fn test_temp_files_always_excluded() {
        let f = filter(&[], &[]);
        assert!(!f.matches(Path::new("/proj/components/.button.templ.swp")));
        assert!(!f.matches(Path::new("/proj/components/button.templ~")));
        assert!(!f.matches(Path::new("/proj/components/button.tmp")));
    }

    #[cfg(unix)]
    #[test]
    fn test_track_dir_detects_revisit() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut f = filter(&[], &[]);
        assert!(f.track_dir(dir.path()));
        assert!(!f.track_dir(dir.path()));
    }
}
