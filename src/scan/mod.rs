//! Source scanning: watcher events in, registry mutations out.
//!
//! ```text
//! FsEvent --created/modified--> parse → ComponentHandler hooks → register
//!         --removed----------> registry.remove (per component in file)
//!         --parse failure----> ErrorCollector (registry untouched)
//! ```

mod parse;

pub use parse::{ParsedComponent, ParsedSource, parse_source, to_component_infos};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::component::ComponentRegistry;
use crate::errors::{ErrorCollector, ParsedError};
use crate::plugin::PluginManager;
use crate::utils::hash::content_hash;
use crate::utils::path::normalize_path;
use crate::watch::{ChangeKind, FsEvent};

/// Source file extension the scanner recognizes.
pub const TEMPL_EXT: &str = "templ";

/// Parses sources and keeps the registry in sync with the tree.
pub struct Scanner {
    registry: Arc<ComponentRegistry>,
    collector: Arc<ErrorCollector>,
    plugins: Arc<PluginManager>,
    /// Absolute scan roots; files outside them are rejected.
    roots: Vec<PathBuf>,
}

impl Scanner {
    pub fn new(
        registry: Arc<ComponentRegistry>,
        collector: Arc<ErrorCollector>,
        plugins: Arc<PluginManager>,
        roots: Vec<PathBuf>,
    ) -> Self {
        let roots = roots.iter().map(|r| normalize_path(r)).collect();
        Self {
            registry,
            collector,
            plugins,
            roots,
        }
    }

    /// Walk all scan roots and parse every templ source in parallel.
    ///
    /// Returns the number of components registered.
    pub fn initial_scan(&self) -> usize {
        let files: Vec<PathBuf> = self
            .roots
            .iter()
            .filter(|root| root.is_dir())
            .flat_map(|root| {
                jwalk::WalkDir::new(root)
                    .skip_hidden(true)
                    .into_iter()
                    .flatten()
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.path())
                    .filter(|path| is_templ_file(path))
                    .collect::<Vec<_>>()
            })
            .collect();

        let registered: usize = files.par_iter().map(|path| self.scan_and_register(path)).sum();

        crate::log!("scan"; "{} component(s) in {} file(s)", registered, files.len());
        registered
    }

    /// React to one debounced watcher event.
    pub fn handle_event(&self, event: &FsEvent) {
        if !is_templ_file(&event.path) {
            return;
        }
        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                self.scan_and_register(&event.path);
            }
            ChangeKind::Removed => self.remove_file(&event.path),
        }
    }

    /// Parse one file and register everything it declares.
    ///
    /// Returns the number of components registered (0 on parse failure).
    pub fn scan_and_register(&self, path: &Path) -> usize {
        let path = normalize_path(path);

        let key = component_key(&path);
        match self.scan_file(&path) {
            Ok(infos) => {
                self.collector.clear(&key);
                let count = infos.len();
                for info in infos {
                    let info = self.plugins.apply_component_handlers(info);
                    self.registry.register(info);
                }
                count
            }
            Err(errors) => {
                crate::logger::status_error(
                    &format!("scan failed: {}", path.display()),
                    &errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n"),
                );
                self.collector.add(&key, errors);
                0
            }
        }
    }

    /// Remove every component declared by a deleted file.
    fn remove_file(&self, path: &Path) {
        let path = normalize_path(path);
        self.collector.clear(&component_key(&path));
        for name in self.registry.by_file(&path) {
            if self.registry.remove(&name) {
                crate::debug!("scan"; "removed {} ({} gone)", name, path.display());
            }
        }
    }

    /// Read, hash, and parse one source file.
    pub fn scan_file(&self, path: &Path) -> Result<Vec<crate::component::ComponentInfo>, Vec<ParsedError>> {
        if !self.is_under_roots(path) {
            return Err(vec![ParsedError::new(
                path,
                0,
                0,
                "source file escapes the configured scan paths",
            )
            .with_rule("path-traversal")]);
        }

        let bytes = std::fs::read(path).map_err(|e| {
            vec![ParsedError::new(path, 0, 0, format!("read failed: {e}"))]
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let parsed = parse_source(path, &content);
        if parsed.has_errors() {
            return Err(parsed.errors);
        }

        let hash = content_hash(&bytes);
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| std::time::SystemTime::now());

        Ok(to_component_infos(&parsed, path, &hash, modified))
    }

    fn is_under_roots(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);
        self.roots.iter().any(|root| normalized.starts_with(root))
    }
}

/// Collector key for diagnostics produced before a component name is
/// known: the file stem.
fn component_key(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn is_templ_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(TEMPL_EXT)
}

// ============================================================================
// Tests
// ============================================================================
