//! Shared watcher event types.

use std::path::PathBuf;
use std::time::SystemTime;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }

    /// Net result of observing `self` then `next` for one path within
    /// a single debounce window.
    ///
    /// `None` collapses the pair into nothing (never happens with the
    /// current table, but the signature leaves room for it).
    pub fn coalesce(self, next: ChangeKind) -> ChangeKind {
        match (self, next) {
            // Appeared then vanished within the window still surfaces
            // as a removal.
            (Self::Created, Self::Removed) => Self::Removed,
            (Self::Modified, Self::Removed) => Self::Removed,
            // Deleted then restored: contents are new to us.
            (Self::Removed, Self::Created | Self::Modified) => Self::Modified,
            (Self::Created, Self::Modified) => Self::Created,
            (first, _) => first,
        }
    }
}

/// A debounced filesystem event delivered to consumers.
#[derive(Debug, Clone)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: SystemTime,
}

impl FsEvent {
    pub fn new(path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            timestamp: SystemTime::now(),
        }
    }
}

/// Watcher-side failure, surfaced on a channel separate from events.
#[derive(Debug)]
pub struct WatchError {
    pub message: String,
    /// True when the error was retried and retries are exhausted.
    pub exhausted: bool,
}

impl WatchError {
    pub fn new(message: impl Into<String>, exhausted: bool) -> Self {
        Self {
            message: message.into(),
            exhausted,
        }
    }
}
