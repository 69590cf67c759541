//! Thread-safe diagnostic accumulator keyed by component.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::ParsedError;

/// Append-only log of [`ParsedError`]s per component.
///
/// Writers (scanner, build workers) append under a short lock; readers
/// clone out a snapshot. No lock is ever held across I/O.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    entries: Mutex<FxHashMap<String, Vec<ParsedError>>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append diagnostics for a component.
    pub fn add(&self, component: &str, errors: Vec<ParsedError>) {
        if errors.is_empty() {
            return;
        }
        self.entries
            .lock()
            .entry(component.to_string())
            .or_default()
            .extend(errors);
    }

    /// Snapshot of the diagnostics recorded for a component.
    pub fn get(&self, component: &str) -> Vec<ParsedError> {
        self.entries
            .lock()
            .get(component)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop all diagnostics for a component (e.g. after a clean build).
    pub fn clear(&self, component: &str) {
        self.entries.lock().remove(component);
    }

    /// Components that currently have at least one recorded error.
    pub fn components_with_errors(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, errs)| !errs.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Total number of recorded diagnostics.
    pub fn total_count(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    /// Render the error overlay HTML for a component.
    ///
    /// All user-derived substrings are escaped; the result is safe to
    /// embed verbatim into a page.
    pub fn render_overlay(&self, component: &str) -> String {
        super::render_overlay(component, &self.get(component))
    }
}
