use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// A connected WebSocket client.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    pub tx: mpsc::UnboundedSender<String>,
}

/// Owns the set of connected sockets.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn add(&self, conn: Connection) {
        let id = conn.id;
        self.connections.write().await.insert(id, conn);
        tracing::info!(connection_id = %id, "Connection added");
    }

    pub async fn remove(&self, id: Uuid) {
        if self.connections.write().await.remove(&id).is_some() {
            tracing::info!(connection_id = %id, "Connection removed");
        }
    }

    /// Queue `message` for one connection.
    ///
    /// Returns `false` if the connection is unknown or closed; a closed connection is
    /// dropped from the registry.
    pub async fn send_to(&self, id: Uuid, message: &str) -> bool {
        let delivered = match self.connections.read().await.get(&id) {
            Some(conn) => conn.tx.send(message.to_string()).is_ok(),
            None => return false,
        };
        if !delivered {
            self.remove(id).await;
        }
        delivered
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }
}
