//! Filesystem watcher with debounced, pattern-filtered events.
//!
//! ```text
//! notify → bounded raw queue → PathFilter → Debouncer → event channel
//!                     \→ error channel (separate; never poisons events)
//! ```
//!
//! The notify watcher starts buffering immediately on `start()`, so
//! changes made during the initial scan are not lost.

mod debounce;
mod filter;
mod types;


pub use debounce::{DEFAULT_WINDOW_MS, Debouncer, MAX_PENDING};
pub use filter::PathFilter;
pub use types::{ChangeKind, FsEvent, WatchError};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::utils::backoff::Backoff;
use crate::utils::path::normalize_path;

/// Raw queue capacity between the notify callback and the run loop.
const RAW_QUEUE: usize = 1000;

/// Delivered event queue capacity.
const EVENT_QUEUE: usize = 1000;

/// Upper bound on one blocking wait, so stop requests are noticed.
const MAX_POLL: Duration = Duration::from_millis(500);

enum Raw {
    Fs(notify::Event),
    Error(notify::Error),
}

struct Inner {
    watcher: Mutex<Option<RecommendedWatcher>>,
    filter: Mutex<PathFilter>,
    event_tx: Mutex<Option<Sender<FsEvent>>>,
    event_steal: Receiver<FsEvent>,
    err_tx: Sender<WatchError>,
    /// Shared with the notify callback.
    dropped: Arc<AtomicU64>,
    stopping: AtomicBool,
    window: Duration,
}

/// Debounced filesystem watcher.
///
/// Owns the OS watch descriptors; they are released on `remove_path`
/// and on `stop`.
pub struct Watcher {
    inner: Arc<Inner>,
    raw_rx: Option<Receiver<Raw>>,
    event_rx: Receiver<FsEvent>,
    err_rx: Receiver<WatchError>,
    handle: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Create a watcher with the given debounce window and global
    /// exclude patterns. Watching begins when roots are added; the
    /// run loop starts with [`start`](Self::start).
    pub fn new(window: Duration, exclude_patterns: &[String]) -> anyhow::Result<Self> {
        let (raw_tx, raw_rx) = channel::bounded::<Raw>(RAW_QUEUE);
        let raw_steal = raw_rx.clone();
        let (event_tx, event_rx) = channel::bounded::<FsEvent>(EVENT_QUEUE);
        let (err_tx, err_rx) = channel::unbounded::<WatchError>();

        let dropped = Arc::new(AtomicU64::new(0));

        let inner = Arc::new(Inner {
            watcher: Mutex::new(None),
            filter: Mutex::new(PathFilter::new(exclude_patterns)?),
            event_tx: Mutex::new(Some(event_tx)),
            event_steal: event_rx.clone(),
            err_tx,
            dropped: Arc::clone(&dropped),
            stopping: AtomicBool::new(false),
            window,
        });

        // The callback runs on notify's thread: push into the bounded
        // raw queue, dropping the oldest unscheduled event on overflow.
        let cb_dropped = dropped;
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let raw = match res {
                Ok(event) => Raw::Fs(event),
                Err(e) => Raw::Error(e),
            };
            match raw_tx.try_send(raw) {
                Ok(()) => {}
                Err(TrySendError::Full(raw)) => {
                    let _ = raw_steal.try_recv();
                    cb_dropped.fetch_add(1, Ordering::Relaxed);
                    let _ = raw_tx.try_send(raw);
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        })?;
        *inner.watcher.lock() = Some(watcher);

        Ok(Self {
            inner,
            raw_rx: Some(raw_rx),
            event_rx,
            err_rx,
            handle: None,
        })
    }

    /// Watch a root directory with include glob patterns.
    ///
    /// The root is watched recursively; directory symlinks directly
    /// under the root are followed one level, with (device, inode)
    /// tracking preventing loops.
    pub fn add_path(&self, root: &Path, include_patterns: &[String]) -> anyhow::Result<()> {
        let root = normalize_path(root);
        let mut filter = self.inner.filter.lock();
        let mut guard = self.inner.watcher.lock();
        let watcher = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("watcher already stopped"))?;

        if !filter.track_dir(&root) {
            crate::debug!("watch"; "skipping already-watched root: {}", root.display());
            return Ok(());
        }
        watcher.watch(&root, RecursiveMode::Recursive)?;
        filter.add_root(&root, include_patterns)?;

        // Follow directory symlinks one level below the root.
        for target in symlinked_dirs(&root) {
            if !filter.track_dir(&target) {
                crate::debug!("watch"; "symlink loop skipped: {}", target.display());
                continue;
            }
            if let Err(e) = watcher.watch(&target, RecursiveMode::Recursive) {
                crate::debug!("watch"; "symlink target not watchable: {}", e);
                continue;
            }
            filter.add_root(&target, include_patterns)?;
        }

        crate::debug!("watch"; "watching {}", root.display());
        Ok(())
    }

    /// Stop watching a root and release its descriptor.
    pub fn remove_path(&self, root: &Path) {
        let root = normalize_path(root);
        if let Some(watcher) = self.inner.watcher.lock().as_mut() {
            let _ = watcher.unwatch(&root);
        }
        self.inner.filter.lock().remove_root(&root);
    }

    /// Debounced event stream. The caller owns the receiver and is
    /// responsible for draining it.
    pub fn events(&self) -> Receiver<FsEvent> {
        self.event_rx.clone()
    }

    /// I/O errors, on a channel separate from events.
    pub fn errors(&self) -> Receiver<WatchError> {
        self.err_rx.clone()
    }

    /// Events dropped due to queue overflow since start.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Shared drop counter, for health reporting.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.inner.dropped)
    }

    /// Spawn the debounce/delivery loop.
    pub fn start(&mut self) {
        let Some(raw_rx) = self.raw_rx.take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        self.handle = Some(
            std::thread::Builder::new()
                .name("templar-watch".to_string())
                .spawn(move || run_loop(&inner, &raw_rx))
                .expect("failed to spawn watcher thread"),
        );
    }

    /// Release all descriptors and join the run loop.
    pub fn stop(&mut self) {
        self.inner.stopping.store(true, Ordering::SeqCst);

        // Dropping the notify watcher releases every watch descriptor.
        {
            let mut guard = self.inner.watcher.lock();
            *guard = None;
        }
        self.inner.filter.lock().clear();

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        // Disconnect consumers once the loop is done.
        *self.inner.event_tx.lock() = None;
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Run loop
// ============================================================================

fn run_loop(inner: &Inner, raw_rx: &Receiver<Raw>) {
    let mut debouncer = Debouncer::new(inner.window);
    let mut backoff = Backoff::transient_io();
    let mut reattach_at: Option<Instant> = None;

    let event_tx = match (*inner.event_tx.lock()).clone() {
        Some(tx) => tx,
        None => return,
    };

    loop {
        if inner.stopping.load(Ordering::SeqCst) {
            break;
        }

        let now = Instant::now();
        let timeout = debouncer.sleep_duration(now).min(MAX_POLL);

        match raw_rx.recv_timeout(timeout) {
            Ok(Raw::Fs(event)) => ingest(inner, &mut debouncer, &event),
            Ok(Raw::Error(error)) => {
                handle_error(inner, &error, &mut backoff, &mut reattach_at);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if let Some(at) = reattach_at {
            if now >= at {
                reattach_at = try_reattach(inner, &mut backoff);
            }
        }

        for fs_event in debouncer.take_due(now) {
            crate::debug!("watch"; "{}: {}", fs_event.kind.label(), fs_event.path.display());
            deliver(inner, &event_tx, fs_event);
        }
    }

    // Count events that never settled.
    inner
        .dropped
        .fetch_add(debouncer.dropped_events(), Ordering::Relaxed);
}

/// Map a raw notify event into debouncer entries.
fn ingest(inner: &Inner, debouncer: &mut Debouncer, event: &notify::Event) {
    use notify::EventKind;
    use notify::event::{ModifyKind, RenameMode};

    let now = Instant::now();

    // Renames arrive as Modify(Name); map them onto remove + create so
    // a moved file nets out as remove(old) + register(new) downstream.
    let kinds: Vec<ChangeKind> = match event.kind {
        EventKind::Create(_) => vec![ChangeKind::Created; event.paths.len()],
        EventKind::Remove(_) => vec![ChangeKind::Removed; event.paths.len()],
        EventKind::Modify(ModifyKind::Metadata(_)) => return,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            vec![ChangeKind::Removed; event.paths.len()]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            vec![ChangeKind::Created; event.paths.len()]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            vec![ChangeKind::Removed, ChangeKind::Created]
        }
        EventKind::Modify(_) => vec![ChangeKind::Modified; event.paths.len()],
        _ => return,
    };

    let filter = inner.filter.lock();
    for (path, kind) in event.paths.iter().zip(kinds) {
        let path = normalize_path(path);
        if !filter.matches(&path) {
            continue;
        }
        debouncer.add(&path, kind, now);
    }
}

/// Deliver one settled event, dropping the oldest buffered event on
/// overflow.
fn deliver(inner: &Inner, tx: &Sender<FsEvent>, event: FsEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            let _ = inner.event_steal.try_recv();
            inner.dropped.fetch_add(1, Ordering::Relaxed);
            let _ = tx.try_send(event);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

fn handle_error(
    inner: &Inner,
    error: &notify::Error,
    backoff: &mut Backoff,
    reattach_at: &mut Option<Instant>,
) {
    crate::log!("watch"; "notify error: {}", error);

    let transient = matches!(
        error.kind,
        notify::ErrorKind::Io(_) | notify::ErrorKind::MaxFilesWatch
    );
    if !transient {
        let _ = inner
            .err_tx
            .send(WatchError::new(error.to_string(), false));
        return;
    }

    match backoff.next_delay() {
        Some(delay) => {
            let _ = inner
                .err_tx
                .send(WatchError::new(error.to_string(), false));
            *reattach_at = Some(Instant::now() + delay);
        }
        None => {
            let _ = inner.err_tx.send(WatchError::new(
                format!("giving up after retries: {error}"),
                true,
            ));
        }
    }
}

/// Re-watch every registered root; schedules another attempt on failure.
fn try_reattach(inner: &Inner, backoff: &mut Backoff) -> Option<Instant> {
    let roots = inner.filter.lock().roots();
    let mut guard = inner.watcher.lock();
    let Some(watcher) = guard.as_mut() else {
        return None;
    };

    let mut failed = false;
    for root in roots {
        // Re-watching an attached root errors harmlessly; a detached
        // one comes back.
        if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
            if !root.exists() {
                continue;
            }
            crate::debug!("watch"; "re-attach failed for {}: {}", root.display(), e);
            failed = true;
        }
    }

    if !failed {
        backoff.reset();
        return None;
    }
    backoff.next_delay().map(|delay| Instant::now() + delay)
}

/// Immediate directory symlinks under a root, resolved.
fn symlinked_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| {
            e.path()
                .symlink_metadata()
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false)
        })
        .filter_map(|e| e.path().canonicalize().ok())
        .filter(|p| p.is_dir())
        .collect()
}
