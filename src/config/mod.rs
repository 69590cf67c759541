//! Project configuration management for `templar.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── server     # [server]
//! │   ├── components # [components]
//! │   ├── build      # [build]
//! │   ├── development# [development]
//! │   ├── plugins    # [plugins]
//! │   └── auth       # [auth] (optional)
//! ├── env            # TEMPLAR_ environment overrides
//! ├── handle         # Global arc-swap config handle
//! └── mod.rs         # TemplarConfig (this file)
//! ```

pub mod env;
mod handle;
pub mod section;

pub use handle::{cfg, init_config, reload_config};
pub use section::{
    AuthConfig, AuthMode, BuildConfig, ComponentsConfig, DevelopmentConfig, PluginsConfig,
    ServerConfig,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name.
pub const CONFIG_FILE: &str = "templar.toml";

/// Binaries the build command is allowed to invoke.
pub const COMMAND_ALLOWLIST: &[&str] = &["templ", "go"];

// ============================================================================
// Root configuration
// ============================================================================

/// Root configuration structure representing `templar.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplarConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Preview server settings
    pub server: ServerConfig,

    /// Component discovery settings
    pub components: ComponentsConfig,

    /// Compiler and pipeline settings
    pub build: BuildConfig,

    /// Developer-experience toggles
    pub development: DevelopmentConfig,

    /// Plugin discovery and activation
    pub plugins: PluginsConfig,

    /// Optional access policy
    pub auth: AuthConfig,
}

impl TemplarConfig {
    /// Load configuration, searching upward from `start` for the config
    /// file. The project root is the config file's parent directory.
    pub fn discover(start: &Path, explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_config_file(start)
                .with_context(|| format!("no `{CONFIG_FILE}` found above {}", start.display()))?,
        };
        Self::from_path(&config_path)
    }

    /// Parse a config file, apply environment overrides, validate.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;

        let mut value: toml::Value = content
            .parse()
            .with_context(|| format!("failed to parse `{}`", path.display()))?;
        env::apply_env_overrides(&mut value);

        let mut config: TemplarConfig = value
            .try_into()
            .with_context(|| format!("invalid configuration in `{}`", path.display()))?;

        config.config_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        config.validate()?;
        Ok(config)
    }

    /// Contract checks that should fail startup (exit code 2).
    pub fn validate(&self) -> Result<()> {
        if self.components.scan_paths.is_empty() {
            bail!("components.scan_paths must not be empty");
        }

        let command = Path::new(&self.build.command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if !COMMAND_ALLOWLIST.contains(&command) {
            bail!(
                "build.command `{}` is not on the allowlist ({})",
                self.build.command,
                COMMAND_ALLOWLIST.join(", ")
            );
        }

        if self.auth.enabled {
            match self.auth.mode {
                AuthMode::Token if self.auth.token.is_none() => {
                    bail!("auth.mode = \"token\" requires auth.token");
                }
                AuthMode::Basic
                    if self.auth.username.is_none() || self.auth.password.is_none() =>
                {
                    bail!("auth.mode = \"basic\" requires auth.username and auth.password");
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Resolve a path relative to the project root.
    pub fn root_join(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Absolute scan roots.
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        self.components
            .scan_paths
            .iter()
            .map(|p| self.root_join(p))
            .collect()
    }

    /// Absolute cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.root_join(&self.build.cache_dir)
    }

    /// Static asset root served under `/static/`.
    pub fn static_root(&self) -> PathBuf {
        self.root.join("static")
    }
}

/// Search upward from `start` for the config file.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

// ============================================================================
// Test helpers
// ============================================================================

/// Parse a config snippet with defaults (section tests use this).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> TemplarConfig {
    let value: toml::Value = content.parse().expect("test config must parse");
    value.try_into().expect("test config must deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.build.command, "templ");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unlisted_command() {
        let mut config = test_parse_config("");
        config.build.command = "bash".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_token_mode_without_token() {
        let config = test_parse_config("[auth]\nenabled = true\nmode = \"token\"");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_find_config_upward() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_from_path_sets_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[server]\nport = 4444").unwrap();

        let config = TemplarConfig::from_path(&path).unwrap();
        assert_eq!(config.server.port, 4444);
        assert!(config.root.is_dir());
    }

    #[test]
    fn test_root_join() {
        let mut config = test_parse_config("");
        config.root = PathBuf::from("/proj");
        assert_eq!(
            config.root_join(Path::new("components")),
            PathBuf::from("/proj/components")
        );
        assert_eq!(
            config.root_join(Path::new("/abs")),
            PathBuf::from("/abs")
        );
    }
}
