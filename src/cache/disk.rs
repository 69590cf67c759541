//! Disk persistence for build results.
//!
//! Layout under the cache directory:
//!
//! ```text
//! entries/<hex-hash>          # Binary build output
//! entries/<hex-hash>.meta     # Metadata (errors, duration, hash)
//! ```
//!
//! All writes go through a temp file + rename, so readers never see a
//! partial entry. A missing or corrupt file is a miss, not an error.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::build::BuildResult;

const ENTRIES_DIR: &str = "entries";

/// Sidecar metadata persisted next to the output blob.
#[derive(Serialize, Deserialize)]
struct DiskMeta {
    result: BuildResult,
    /// Length of the output blob, for corruption detection.
    output_len: Option<u64>,
}

/// File-backed cache layer.
pub struct DiskCache {
    entries: PathBuf,
}

impl DiskCache {
    pub fn open(cache_dir: &Path) -> std::io::Result<Self> {
        let entries = cache_dir.join(ENTRIES_DIR);
        fs::create_dir_all(&entries)?;
        Ok(Self { entries })
    }

    /// Load an entry; any inconsistency is a miss.
    pub fn load(&self, hash: &str) -> Option<BuildResult> {
        if !is_hex_hash(hash) {
            return None;
        }

        let meta_bytes = fs::read(self.meta_path(hash)).ok()?;
        let meta: DiskMeta = match serde_json::from_slice(&meta_bytes) {
            Ok(meta) => meta,
            Err(_) => {
                self.remove(hash);
                return None;
            }
        };

        let mut result = meta.result;
        if result.content_hash != hash {
            self.remove(hash);
            return None;
        }

        match meta.output_len {
            Some(expected) => {
                let bytes = fs::read(self.output_path(hash)).ok()?;
                if bytes.len() as u64 != expected {
                    self.remove(hash);
                    return None;
                }
                result.output_bytes = Some(bytes);
            }
            None => result.output_bytes = None,
        }

        Some(result)
    }

    /// Persist an entry atomically.
    pub fn store(&self, result: &BuildResult) -> std::io::Result<()> {
        let hash = &result.content_hash;
        if !is_hex_hash(hash) {
            return Ok(());
        }

        if let Some(output) = &result.output_bytes {
            write_atomic(&self.output_path(hash), output)?;
        }

        let meta = DiskMeta {
            result: BuildResult {
                output_bytes: None,
                ..result.clone()
            },
            output_len: result.output_bytes.as_ref().map(|b| b.len() as u64),
        };
        let json = serde_json::to_vec(&meta)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_atomic(&self.meta_path(hash), &json)
    }

    /// Best-effort removal of both files.
    pub fn remove(&self, hash: &str) {
        if !is_hex_hash(hash) {
            return;
        }
        let _ = fs::remove_file(self.output_path(hash));
        let _ = fs::remove_file(self.meta_path(hash));
    }

    fn output_path(&self, hash: &str) -> PathBuf {
        self.entries.join(hash)
    }

    fn meta_path(&self, hash: &str) -> PathBuf {
        self.entries.join(format!("{hash}.meta"))
    }
}

/// Only hex digests may name cache files.
fn is_hex_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Write via temp file + rename in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    let tmp = dir.join(format!(
        ".tmp-{}-{}",
        std::process::id(),
        path.file_name().and_then(|n| n.to_str()).unwrap_or("entry")
    ));

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(hash: &str) -> BuildResult {
        BuildResult::success("Button", hash, b"<button></button>".to_vec(), Duration::from_millis(7))
    }

    #[test]
    fn test_store_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path()).unwrap();
        disk.store(&result("abc123")).unwrap();

        let loaded = disk.load("abc123").unwrap();
        assert!(loaded.success);
        assert_eq!(loaded.output_bytes.unwrap(), b"<button></button>");
        assert_eq!(loaded.component_name, "Button");
    }

    #[test]
    fn test_missing_entry_is_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path()).unwrap();
        assert!(disk.load("deadbeef").is_none());
    }

    #[test]
    fn test_corrupt_meta_is_miss_and_cleaned() {
        let dir = tempfile::TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path()).unwrap();
        disk.store(&result("abc123")).unwrap();

        std::fs::write(dir.path().join("entries/abc123.meta"), b"{not json").unwrap();
        assert!(disk.load("abc123").is_none());
        // Second load stays a miss (files removed).
        assert!(disk.load("abc123").is_none());
    }

    #[test]
    fn test_truncated_output_is_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path()).unwrap();
        disk.store(&result("abc123")).unwrap();

        std::fs::write(dir.path().join("entries/abc123"), b"<but").unwrap();
        assert!(disk.load("abc123").is_none());
    }

    #[test]
    fn test_non_hex_hash_never_touches_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path()).unwrap();
        assert!(disk.load("../../etc/passwd").is_none());
        disk.store(&result("../escape")).unwrap();
        assert!(!dir.path().join("../escape").exists());
    }

    #[test]
    fn test_failure_results_persist_without_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let disk = DiskCache::open(dir.path()).unwrap();
        let failed = BuildResult::failure(
            "Button",
            "bad123",
            vec![crate::errors::ParsedError::new("b.templ", 1, 2, "boom")],
            Duration::from_millis(3),
        );
        disk.store(&failed).unwrap();

        let loaded = disk.load("bad123").unwrap();
        assert!(!loaded.success);
        assert!(loaded.output_bytes.is_none());
        assert_eq!(loaded.errors.len(), 1);
    }
}
