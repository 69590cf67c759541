//! Bounded content-addressed cache of build results.
//!
//! In-memory layer: an LRU keyed by content hash, bounded by entry
//! count and by total bytes; eviction runs until both constraints
//! hold. Disk layer: `<cache_dir>/entries/<hash>` + `<hash>.meta`,
//! written atomically, where missing or corrupt entries are misses.

mod disk;

pub use disk::DiskCache;

use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use parking_lot::Mutex;

use crate::build::BuildResult;

/// Default entry-count cap.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default byte cap (100 MiB).
pub const DEFAULT_MAX_BYTES: usize = 100 * 1024 * 1024;

struct CacheState {
    entries: LruCache<String, BuildResult>,
    total_bytes: usize,
}

/// Thread-safe LRU of [`BuildResult`]s keyed by content hash.
///
/// The cache exclusively owns its entries; eviction (or explicit
/// invalidation) is the only release path. Lookups touch the entry to
/// MRU position. Failed builds cache too, so flaky compiles are not
/// retried indefinitely.
pub struct BuildCache {
    state: Mutex<CacheState>,
    max_bytes: usize,
    disk: Option<DiskCache>,
}

impl BuildCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
            disk: None,
        }
    }

    /// Attach a disk layer under `cache_dir`.
    pub fn with_disk(mut self, cache_dir: &Path) -> Self {
        match DiskCache::open(cache_dir) {
            Ok(disk) => self.disk = Some(disk),
            Err(e) => crate::log!("cache"; "disk cache unavailable: {}", e),
        }
        self
    }

    /// Look up by content hash; touches the entry to MRU.
    ///
    /// Falls through to the disk layer on a memory miss and re-warms
    /// memory on a disk hit.
    pub fn get(&self, hash: &str) -> Option<BuildResult> {
        if let Some(result) = self.state.lock().entries.get(hash).cloned() {
            return Some(result);
        }

        let disk = self.disk.as_ref()?;
        let result = disk.load(hash)?;
        self.put(result.clone());
        Some(result)
    }

    /// Insert a result, evicting LRU entries until both the entry and
    /// byte caps hold.
    pub fn put(&self, result: BuildResult) {
        let hash = result.content_hash.clone();
        let size = result.size_bytes();

        {
            let mut state = self.state.lock();
            if let Some(old) = state.entries.put(hash, result.clone()) {
                state.total_bytes = state.total_bytes.saturating_sub(old.size_bytes());
            }
            state.total_bytes += size;

            while state.total_bytes > self.max_bytes {
                match state.entries.pop_lru() {
                    Some((_, evicted)) => {
                        state.total_bytes =
                            state.total_bytes.saturating_sub(evicted.size_bytes());
                    }
                    None => break,
                }
            }
        }

        // Disk write outside the lock; I/O errors only cost persistence.
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.store(&result) {
                crate::debug!("cache"; "persist failed for {}: {}", result.content_hash, e);
            }
        }
    }

    /// Drop a hash from memory and disk.
    pub fn invalidate(&self, hash: &str) {
        let mut state = self.state.lock();
        if let Some(old) = state.entries.pop(hash) {
            state.total_bytes = state.total_bytes.saturating_sub(old.size_bytes());
        }
        drop(state);

        if let Some(disk) = &self.disk {
            disk.remove(hash);
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_MAX_BYTES)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(hash: &str, size: usize) -> BuildResult {
        BuildResult::success("Button", hash, vec![b'x'; size], Duration::from_millis(5))
    }

    #[test]
    fn test_put_get_roundtrip() {
        let cache = BuildCache::new(10, 1 << 20);
        cache.put(result("aa", 100));

        let got = cache.get("aa").unwrap();
        assert_eq!(got.output_bytes.unwrap().len(), 100);
        assert!(cache.get("bb").is_none());
    }

    #[test]
    fn test_entry_cap_evicts_lru() {
        let cache = BuildCache::new(2, 1 << 20);
        cache.put(result("aa", 10));
        cache.put(result("bb", 10));
        // Touch "aa" so "bb" becomes LRU.
        cache.get("aa");
        cache.put(result("cc", 10));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("aa").is_some());
        assert!(cache.get("bb").is_none());
        assert!(cache.get("cc").is_some());
    }

    #[test]
    fn test_byte_cap_evicts_until_under() {
        let cache = BuildCache::new(100, 250);
        cache.put(result("aa", 100));
        cache.put(result("bb", 100));
        cache.put(result("cc", 100));

        assert!(cache.total_bytes() <= 250);
        assert!(cache.get("cc").is_some());
    }

    #[test]
    fn test_caps_hold_under_any_sequence() {
        let cache = BuildCache::new(5, 1000);
        for i in 0..50 {
            cache.put(result(&format!("h{i}"), (i * 17) % 300));
            assert!(cache.len() <= 5);
            assert!(cache.total_bytes() <= 1000);
        }
    }

    #[test]
    fn test_replacing_entry_adjusts_bytes() {
        let cache = BuildCache::new(10, 1 << 20);
        cache.put(result("aa", 500));
        cache.put(result("aa", 20));
        assert!(cache.total_bytes() < 500);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = BuildCache::new(10, 1 << 20);
        cache.put(result("aa", 10));
        cache.invalidate("aa");
        assert!(cache.get("aa").is_none());
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn test_failures_cache_too() {
        let cache = BuildCache::new(10, 1 << 20);
        cache.put(BuildResult::failure(
            "Button",
            "bad",
            vec![crate::errors::ParsedError::new("b.templ", 1, 1, "boom")],
            Duration::from_millis(3),
        ));

        let got = cache.get("bad").unwrap();
        assert!(!got.success);
        assert_eq!(got.errors.len(), 1);
    }

    #[test]
    fn test_evict_all_but_one_keeps_value() {
        let cache = BuildCache::new(1, 1 << 20);
        cache.put(result("aa", 10));
        cache.put(result("bb", 10));
        // "aa" evicted by capacity; "bb" retrievable intact.
        let got = cache.get("bb").unwrap();
        assert_eq!(got.content_hash, "bb");
    }

    #[test]
    fn test_disk_layer_survives_memory_miss() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = BuildCache::new(10, 1 << 20).with_disk(dir.path());
        cache.put(result("aa", 64));

        // Fresh cache over the same directory: memory is cold.
        let reopened = BuildCache::new(10, 1 << 20).with_disk(dir.path());
        let got = reopened.get("aa").unwrap();
        assert_eq!(got.output_bytes.unwrap().len(), 64);
    }
}
