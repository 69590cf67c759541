//! Reload broadcast hub.
//!
//! One sender thread per connection, fed by a bounded per-connection
//! queue. Broadcasts push non-blockingly: when a client's queue is
//! full, that client is closed. Drop the client, never the event, and
//! never block the broadcaster.

use crossbeam::channel::{self, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tungstenite::protocol::Message;

use super::ws::UpgradedStream;
use crate::reload::ReloadMessage;

/// Per-connection send buffer capacity.
pub const SEND_BUFFER: usize = 64;

struct Client {
    id: u64,
    tx: Sender<Message>,
}

/// Fan-out hub owning all upgraded connections.
///
/// Closing the hub closes every connection.
pub struct BroadcastHub {
    clients: Mutex<Vec<Client>>,
    next_id: AtomicU64,
    connected: Arc<AtomicUsize>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            connected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Adopt an upgraded connection; spawns its sender thread.
    pub fn add_client(&self, mut ws: tungstenite::WebSocket<UpgradedStream>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = channel::bounded::<Message>(SEND_BUFFER);

        let connected = Arc::clone(&self.connected);
        connected.fetch_add(1, Ordering::SeqCst);

        let spawned = std::thread::Builder::new()
            .name(format!("templar-ws-{id}"))
            .spawn(move || {
                // Drain until every sender is gone, then close.
                while let Ok(message) = rx.recv() {
                    if ws.send(message).is_err() {
                        break;
                    }
                }
                let _ = ws.close(None);
                let _ = ws.flush();
                connected.fetch_sub(1, Ordering::SeqCst);
            });

        match spawned {
            Ok(_) => {
                self.clients.lock().push(Client { id, tx });
                crate::debug!("ws"; "client {} connected ({} total)", id, self.client_count());
            }
            Err(e) => {
                self.connected.fetch_sub(1, Ordering::SeqCst);
                crate::log!("ws"; "failed to spawn sender for client {}: {}", id, e);
            }
        }
    }

    /// Broadcast to every connection; slow clients are closed.
    pub fn broadcast(&self, message: &ReloadMessage) {
        let text = Message::Text(message.to_json().into());

        // Snapshot under lock, send outside it.
        let snapshot: Vec<(u64, Sender<Message>)> = self
            .clients
            .lock()
            .iter()
            .map(|c| (c.id, c.tx.clone()))
            .collect();
        if snapshot.is_empty() {
            return;
        }

        let mut drop_ids = Vec::new();
        for (id, tx) in &snapshot {
            match tx.try_send(text.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    crate::debug!("ws"; "client {} too slow, closing", id);
                    drop_ids.push(*id);
                }
                Err(TrySendError::Disconnected(_)) => drop_ids.push(*id),
            }
        }

        if !drop_ids.is_empty() {
            // Dropping the sender ends that client's thread, which
            // closes the socket.
            self.clients.lock().retain(|c| !drop_ids.contains(&c.id));
        }
    }

    /// Currently connected client count (includes closing stragglers).
    pub fn client_count(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    /// Broadcast `shutdown` and close every connection.
    pub fn shutdown(&self) {
        self.broadcast(&ReloadMessage::shutdown());
        self.clients.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // The hub's send path needs real sockets; these tests pin the
    // queue-policy logic via the channel layer instead.

    #[test]
    fn test_try_send_full_policy() {
        let (tx, rx) = channel::bounded::<Message>(2);
        tx.try_send(Message::Text("a".into())).unwrap();
        tx.try_send(Message::Text("b".into())).unwrap();

        // Third send reports Full without blocking.
        assert!(matches!(
            tx.try_send(Message::Text("c".into())),
            Err(TrySendError::Full(_))
        ));
        drop(rx);
        assert!(matches!(
            tx.try_send(Message::Text("d".into())),
            Err(TrySendError::Disconnected(_))
        ));
    }

    #[test]
    fn test_empty_hub_broadcast_is_noop() {
        let hub = BroadcastHub::new();
        hub.broadcast(&ReloadMessage::full_reload("test"));
        assert_eq!(hub.client_count(), 0);
    }

    #[test]
    fn test_shutdown_clears_clients() {
        let hub = BroadcastHub::new();
        hub.shutdown();
        assert!(hub.clients.lock().is_empty());
    }
}
