//! Authoritative component catalog with event broadcast.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::cycles;
use super::{ComponentEvent, ComponentInfo, EventKind};

/// Per-subscriber event buffer capacity.
pub const SUBSCRIBER_BUFFER: usize = 100;

/// One subscriber's end of the broadcast.
///
/// The publisher keeps a receiver clone so it can evict the oldest
/// buffered event when the channel is full; crossbeam channels are
/// MPMC, so the steal and the subscriber's own `recv` race safely.
struct Subscriber {
    tx: Sender<ComponentEvent>,
    steal: Receiver<ComponentEvent>,
}

/// Maps name → [`ComponentInfo`] and fans mutations out to subscribers.
///
/// Readers are unrestricted; mutations are serialized through a write
/// gate that also covers event publication, so every subscriber
/// observes events in publication order. Publication never blocks: a
/// full subscriber buffer drops that subscriber's oldest event.
pub struct ComponentRegistry {
    components: RwLock<FxHashMap<String, ComponentInfo>>,
    subscribers: Mutex<Vec<Subscriber>>,
    /// Serializes register/remove including their publish step.
    write_gate: Mutex<()>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            components: RwLock::new(FxHashMap::default()),
            subscribers: Mutex::new(Vec::new()),
            write_gate: Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert or update a component. Cannot fail.
    ///
    /// Re-registering with an unchanged `content_hash` is a no-op and
    /// emits no event.
    pub fn register(&self, info: ComponentInfo) {
        let _gate = self.write_gate.lock();

        let event = {
            let mut map = self.components.write();
            let kind = match map.get(&info.name) {
                Some(existing) if existing.content_hash == info.content_hash => return,
                Some(_) => EventKind::Updated,
                None => EventKind::Added,
            };
            let event = ComponentEvent::new(kind, info.name.clone(), Some(info.clone()));
            map.insert(info.name.clone(), info);
            event
        };
        self.publish(event);
    }

    /// Remove a component by name. Returns `false` when unknown.
    pub fn remove(&self, name: &str) -> bool {
        let _gate = self.write_gate.lock();

        let Some(removed) = self.components.write().remove(name) else {
            return false;
        };

        self.publish(ComponentEvent::new(
            EventKind::Removed,
            name,
            Some(removed),
        ));
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<ComponentInfo> {
        self.components.read().get(name).cloned()
    }

    pub fn all(&self) -> Vec<ComponentInfo> {
        self.components.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.components.read().len()
    }

    /// Components whose `file_path` matches the given source file.
    ///
    /// One source file may declare several components; file deletions
    /// remove them all.
    pub fn by_file(&self, path: &std::path::Path) -> Vec<String> {
        self.components
            .read()
            .values()
            .filter(|c| c.file_path == path)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Dependency names referenced but not registered (diagnostics, not
    /// errors).
    pub fn unknown_dependencies(&self) -> Vec<(String, String)> {
        let map = self.components.read();
        let mut unknown = Vec::new();
        for info in map.values() {
            for dep in &info.dependencies {
                if !map.contains_key(dep) {
                    unknown.push((info.name.clone(), dep.clone()));
                }
            }
        }
        unknown
    }

    /// Detect dependency cycles over the current graph.
    ///
    /// Pure read; the graph may legitimately contain cycles and
    /// registration never refuses them.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        cycles::detect(&self.components.read())
    }

    // ------------------------------------------------------------------
    // Broadcast
    // ------------------------------------------------------------------

    /// Subscribe to registry mutations.
    ///
    /// Each subscriber gets a private bounded channel. When the buffer
    /// is full, that subscriber's oldest event is dropped; the
    /// publisher never blocks. Dropped receivers are pruned on the next
    /// publish. On [`close`](Self::close), all channels disconnect.
    pub fn watch(&self) -> Receiver<ComponentEvent> {
        let (tx, rx) = channel::bounded(SUBSCRIBER_BUFFER);
        self.subscribers.lock().push(Subscriber {
            tx,
            steal: rx.clone(),
        });
        rx
    }

    /// Disconnect all subscriber channels (shutdown).
    pub fn close(&self) {
        self.subscribers.lock().clear();
    }

    fn publish(&self, event: ComponentEvent) {
        // Snapshot under lock, send outside. Sends are try_send and the
        // write gate is already held, so order per subscriber is stable.
        let snapshot: Vec<(Sender<ComponentEvent>, Receiver<ComponentEvent>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| (s.tx.clone(), s.steal.clone()))
            .collect();

        let mut disconnected = false;
        for (tx, steal) in &snapshot {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(ev)) => {
                    // Per-subscriber drop-oldest: evict one, retry once.
                    let _ = steal.try_recv();
                    if tx.try_send(ev).is_err() {
                        disconnected = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => disconnected = true,
            }
        }

        if disconnected {
            self.subscribers
                .lock()
                .retain(|s| s.steal.receiver_count() > 1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
