//! Global config with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic config replacement.
//! This enables hot-reloading of `templar.toml` during serve mode.

use crate::config::TemplarConfig;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::sync::{Arc, LazyLock};

/// Global config storage.
static CONFIG: LazyLock<ArcSwap<TemplarConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(TemplarConfig::default()));

/// Global hash of the current config file content.
static CONFIG_HASH: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

#[inline]
pub fn cfg() -> Arc<TemplarConfig> {
    CONFIG.load_full()
}

/// Install a freshly loaded config as the global.
pub fn init_config(config: TemplarConfig) -> Arc<TemplarConfig> {
    if config.config_path.exists() {
        if let Ok(content) = std::fs::read(&config.config_path) {
            CONFIG_HASH.store(
                crate::utils::hash::hash_bytes(&content),
                std::sync::atomic::Ordering::Relaxed,
            );
        }
    }

    let arc = Arc::new(config);
    CONFIG.store(Arc::clone(&arc));
    arc
}

/// Reload config from disk if content changed.
///
/// Returns `Ok(true)` if config was updated, `Ok(false)` if unchanged.
pub fn reload_config() -> Result<bool> {
    let current = cfg();

    let content = std::fs::read(&current.config_path)?;
    let new_hash = crate::utils::hash::hash_bytes(&content);

    let old_hash = CONFIG_HASH.load(std::sync::atomic::Ordering::Relaxed);
    if new_hash == old_hash {
        return Ok(false);
    }

    let new_config = TemplarConfig::from_path(&current.config_path)?;
    CONFIG.store(Arc::new(new_config));
    CONFIG_HASH.store(new_hash, std::sync::atomic::Ordering::Relaxed);

    Ok(true)
}
