//! Book-keeping for live WebSocket connections.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use tokio::sync::Mutex as AsyncMutex;

/// Process-unique identifier for one live connection.
pub type ConnId = u64;

/// Write half of a client socket behind its write lock. Every frame written
/// to the client — handshake, pong, or broadcast — goes through this mutex,
/// so frames are never interleaved on the wire.
pub type FrameWriter = Arc<AsyncMutex<SplitSink<WebSocket, Message>>>;

struct ClientEntry {
    writer: FrameWriter,
    authenticated: bool,
}

/// Tracks open connections and their authentication state, plus the set of
/// connections whose reader task should tear the transport down.
///
/// Closure is split in two steps: any task may *request* teardown via
/// [`ClientRegistry::request_close`]; only the connection's reader task
/// performs the close, in its cleanup path.
#[derive(Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: AsyncMutex<HashMap<ConnId, ClientEntry>>,
    close_pending: AsyncMutex<HashSet<ConnId>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly upgraded connection as not yet authenticated.
    pub async fn insert(&self, writer: FrameWriter) -> ConnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.clients.lock().await.insert(
            id,
            ClientEntry {
                writer,
                authenticated: false,
            },
        );
        id
    }

    /// Flip the connection to authenticated. Returns false when the
    /// connection is already gone.
    pub async fn promote(&self, id: ConnId) -> bool {
        match self.clients.lock().await.get_mut(&id) {
            Some(entry) => {
                entry.authenticated = true;
                true
            }
            None => false,
        }
    }

    /// Copy out the authenticated targets so fan-out iteration never holds
    /// the registry lock.
    pub async fn authenticated_snapshot(&self) -> Vec<(ConnId, FrameWriter)> {
        self.clients
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| entry.authenticated)
            .map(|(id, entry)| (*id, entry.writer.clone()))
            .collect()
    }

    pub async fn authenticated_count(&self) -> usize {
        self.clients
            .lock()
            .await
            .values()
            .filter(|entry| entry.authenticated)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Drop the connection from the live map. Idempotent; the close-pending
    /// marker is left alone so a reader that has not yet observed it still
    /// exits.
    pub async fn remove(&self, id: ConnId) {
        self.clients.lock().await.remove(&id);
    }

    /// Ask the connection's reader task to tear down the transport.
    pub async fn request_close(&self, id: ConnId) {
        self.close_pending.lock().await.insert(id);
    }

    pub async fn close_requested(&self, id: ConnId) -> bool {
        self.close_pending.lock().await.contains(&id)
    }

    /// Reader-exit cleanup: forget any teardown request for this id.
    pub async fn clear_close_request(&self, id: ConnId) {
        self.close_pending.lock().await.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Building a FrameWriter requires a real WebSocket, so the full
    // insert/promote/remove cycle is covered by the crate's integration
    // tests; what can be exercised here is the id-keyed state.

    #[tokio::test]
    async fn close_requests_are_idempotent_and_clearable() {
        let registry = ClientRegistry::new();

        assert!(!registry.close_requested(7).await);
        registry.request_close(7).await;
        registry.request_close(7).await;
        assert!(registry.close_requested(7).await);

        registry.clear_close_request(7).await;
        assert!(!registry.close_requested(7).await);
        // Clearing an absent entry is a no-op.
        registry.clear_close_request(7).await;
    }

    #[tokio::test]
    async fn empty_registry_reports_no_targets() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty().await);
        assert_eq!(registry.len().await, 0);
        assert_eq!(registry.authenticated_count().await, 0);
        assert!(registry.authenticated_snapshot().await.is_empty());
        // Removing or promoting unknown ids must not panic.
        registry.remove(42).await;
        assert!(!registry.promote(42).await);
    }
}
