//! Pure debouncer: timing and per-path coalescing only.
//!
//! Policy is trailing-edge coalesce by path: every raw event schedules
//! delivery at `now + window` for its path; further events for the same
//! path push the deadline out again and fold into a net [`ChangeKind`].
//! At most one event per path is delivered per settle.
//!
//! No business logic, no global state access.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::types::{ChangeKind, FsEvent};

/// Default debounce window.
pub const DEFAULT_WINDOW_MS: u64 = 300;

/// Maximum paths buffered while waiting to settle.
pub const MAX_PENDING: usize = 1000;

#[derive(Debug)]
struct Pending {
    kind: ChangeKind,
    deadline: Instant,
    /// Arrival order for overflow eviction (oldest first).
    seq: u64,
}

/// Trailing-edge per-path debouncer.
pub struct Debouncer {
    window: Duration,
    pending: FxHashMap<PathBuf, Pending>,
    next_seq: u64,
    /// Events discarded due to the pending cap.
    dropped: u64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: FxHashMap::default(),
            next_seq: 0,
            dropped: 0,
        }
    }

    /// Record a raw event for `path`, resetting its deadline.
    pub fn add(&mut self, path: &Path, kind: ChangeKind, now: Instant) {
        if let Some(entry) = self.pending.get_mut(path) {
            entry.kind = entry.kind.coalesce(kind);
            entry.deadline = now + self.window;
            return;
        }

        if self.pending.len() >= MAX_PENDING {
            self.evict_oldest();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(
            path.to_path_buf(),
            Pending {
                kind,
                deadline: now + self.window,
                seq,
            },
        );
    }

    /// Remove and return all events whose window has settled.
    pub fn take_due(&mut self, now: Instant) -> Vec<FsEvent> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        let mut events: Vec<(u64, FsEvent)> = due
            .into_iter()
            .filter_map(|path| {
                self.pending
                    .remove(&path)
                    .map(|p| (p.seq, FsEvent::new(path, p.kind)))
            })
            .collect();

        // Stable order across paths is not guaranteed by contract, but
        // arrival order keeps logs readable.
        events.sort_by_key(|(seq, _)| *seq);
        events.into_iter().map(|(_, ev)| ev).collect()
    }

    /// Earliest pending deadline, for precise sleeping.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Sleep duration until the next possible settle.
    pub fn sleep_duration(&self, now: Instant) -> Duration {
        match self.next_deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(now)
                .max(Duration::from_millis(1)),
            None => Duration::from_secs(86400),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }

    fn evict_oldest(&mut self) {
        if let Some(path) = self
            .pending
            .iter()
            .min_by_key(|(_, p)| p.seq)
            .map(|(path, _)| path.clone())
        {
            self.pending.remove(&path);
            self.dropped += 1;
        }
    }
}
