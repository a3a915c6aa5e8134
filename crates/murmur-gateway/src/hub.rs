use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, mpsc::error::TrySendError};
use tracing::warn;
use uuid::Uuid;

use murmur_types::events::LiveEvent;

pub type ConnectionId = Uuid;

/// Events a connection may have queued but not yet written. A connection that
/// falls this far behind is dropped from the hub.
pub const QUEUE_CAPACITY: usize = 256;

/// Outbound queue for one live connection.
pub type EventReceiver = mpsc::Receiver<Arc<LiveEvent>>;

/// The fan-out point for live events. Owns the registry of every open
/// connection; `connect` and `disconnect` are the only ways it changes.
#[derive(Clone, Default)]
pub struct Hub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    /// conn_id -> outbound queue
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<Arc<LiveEvent>>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns its id and the receiver it should
    /// drain into its socket.
    pub async fn connect(&self) -> (ConnectionId, EventReceiver) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Returns whether the connection was registered.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> bool {
        self.inner.connections.write().await.remove(&conn_id).is_some()
    }

    /// Relay an event to every connection, the sender included. Returns how
    /// many queues accepted it.
    ///
    /// Never waits on a connection. One whose queue is full is unregistered,
    /// which closes its queue once drained and ends its socket.
    pub async fn broadcast(&self, event: LiveEvent) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0;
        let mut lagging = Vec::new();

        {
            let connections = self.inner.connections.read().await;
            for (conn_id, tx) in connections.iter() {
                match tx.try_send(Arc::clone(&event)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => lagging.push(*conn_id),
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }

        if !lagging.is_empty() {
            let mut connections = self.inner.connections.write().await;
            for conn_id in lagging {
                warn!("Connection {} fell {} events behind, dropping it", conn_id, QUEUE_CAPACITY);
                connections.remove(&conn_id);
            }
        }

        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}
