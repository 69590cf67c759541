//! Deterministic content hashing.
//!
//! All freshness decisions key off blake3 digests of source bytes.
//! `std::collections::hash_map::DefaultHasher` is seeded randomly per
//! process and is NOT stable across restarts, so it must never be used
//! for cache keys.

use std::io::{self, Read};
use std::path::Path;

// =============================================================================
// Content hash (cache key)
// =============================================================================

/// Compute the full hex digest of a byte slice.
///
/// This is the canonical content hash: it keys the build cache and
/// decides whether a re-scan actually changed a component.
#[inline]
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}

/// Compute the content hash of a file on disk.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut file = std::fs::File::open(path)?;
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

// =============================================================================
// StableHasher - Builder Pattern
// =============================================================================

/// A deterministic hasher using blake3.
///
/// Unlike `std::hash::Hasher`, this produces the same output across
/// process restarts for the same input.
pub struct StableHasher {
    inner: blake3::Hasher,
}

impl StableHasher {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Update with raw bytes
    #[inline]
    pub fn update(mut self, data: &[u8]) -> Self {
        self.inner.update(data);
        self
    }

    /// Update with a string
    #[inline]
    pub fn update_str(self, s: &str) -> Self {
        self.update(s.as_bytes())
    }

    /// Finish and return the hash as u64
    ///
    /// Takes the first 8 bytes of blake3 output as little-endian u64.
    #[inline]
    pub fn finish(self) -> u64 {
        let hash = self.inner.finalize();
        u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap())
    }
}

impl Default for StableHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a byte slice to u64 (internal fingerprints, not cache keys)
#[inline]
pub fn hash_bytes(data: &[u8]) -> u64 {
    StableHasher::new().update(data).finish()
}

/// Hash a string to u64
#[inline]
pub fn hash_str(s: &str) -> u64 {
    hash_bytes(s.as_bytes())
}

// =============================================================================
// Tests
// =============================================================================
