use axum::extract::ws::{CloseFrame, Message};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

/// One attached agent. Outbound frames go through a bounded queue drained by
/// the connection's writer task; once that task is gone every send fails.
pub struct Connection {
    conn_id: String,
    sender: mpsc::Sender<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Failed,
}

impl Connection {
    pub fn new(conn_id: String, sender: mpsc::Sender<Message>) -> Self {
        Self { conn_id, sender }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub async fn send_text(&self, text: &str) -> SendOutcome {
        match self.sender.send(Message::Text(text.to_string())).await {
            Ok(()) => SendOutcome::Delivered,
            Err(_) => SendOutcome::Failed,
        }
    }

    /// Best effort: a full or closed queue means the writer is already gone
    /// or about to be.
    fn close(&self, reason: &str) {
        let _ = self.sender.try_send(Message::Close(Some(CloseFrame {
            code: 1000,
            reason: reason.to_string().into(),
        })));
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    conn_counter: AtomicU64,
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_conn_id(&self) -> String {
        let id = self.conn_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("conn-{id}")
    }

    pub async fn register(&self, conn: Arc<Connection>) {
        let total = {
            let mut connections = self.connections.write().await;
            connections.insert(conn.conn_id.clone(), conn.clone());
            connections.len()
        };
        info!(event = "client_connected", conn_id = %conn.conn_id, connections = total);
    }

    /// Removes the connection if still present. Returns whether it was.
    pub async fn unregister(&self, conn_id: &str, reason: &str) -> bool {
        let removed = self.connections.write().await.remove(conn_id);
        let Some(conn) = removed else {
            return false;
        };
        conn.close(reason);
        info!(event = "client_disconnected", conn_id = %conn_id, reason = reason);
        true
    }

    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sends `text` to every registered connection. Connections whose send
    /// fails are evicted in the same pass; the fan-out always completes.
    pub async fn broadcast(&self, text: &str) -> Vec<(String, SendOutcome)> {
        let targets = self.snapshot().await;
        let mut outcomes = Vec::with_capacity(targets.len());
        for conn in targets {
            let outcome = conn.send_text(text).await;
            if outcome == SendOutcome::Failed {
                warn!(event = "send_error", conn_id = %conn.conn_id);
                self.unregister(&conn.conn_id, "send_error").await;
            }
            outcomes.push((conn.conn_id.clone(), outcome));
        }
        outcomes
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn attach(
        registry: &ConnectionRegistry,
        capacity: usize,
    ) -> (Arc<Connection>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = Arc::new(Connection::new(registry.next_conn_id(), tx));
        (conn, rx)
    }

    pub(crate) fn drain_texts(rx: &mut mpsc::Receiver<Message>) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                texts.push(text);
            }
        }
        texts
    }

    #[test]
    fn conn_ids_are_unique() {
        let registry = ConnectionRegistry::new();
        let first = registry.next_conn_id();
        let second = registry.next_conn_id();
        assert_eq!(first, "conn-1");
        assert_eq!(second, "conn-2");
    }

    #[tokio::test]
    async fn register_and_unregister() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = attach(&registry, 4);
        registry.register(conn.clone()).await;
        assert_eq!(registry.len().await, 1);

        assert!(registry.unregister(conn.conn_id(), "test").await);
        assert!(registry.is_empty().await);
        assert!(!registry.unregister(conn.conn_id(), "test").await);
    }

    #[tokio::test]
    async fn broadcast_to_empty_registry_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        assert!(registry.broadcast("resume,1").await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let (a, mut a_rx) = attach(&registry, 4);
        let (b, mut b_rx) = attach(&registry, 4);
        registry.register(a).await;
        registry.register(b).await;

        let outcomes = registry.broadcast("resume,2").await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|(_, outcome)| *outcome == SendOutcome::Delivered));
        assert_eq!(drain_texts(&mut a_rx), vec!["resume,2".to_string()]);
        assert_eq!(drain_texts(&mut b_rx), vec!["resume,2".to_string()]);
    }

    #[tokio::test]
    async fn broadcast_evicts_failed_connection_and_continues() {
        let registry = ConnectionRegistry::new();
        let (dead, dead_rx) = attach(&registry, 4);
        let (live, mut live_rx) = attach(&registry, 4);
        let dead_id = dead.conn_id().to_string();
        registry.register(dead).await;
        registry.register(live.clone()).await;
        drop(dead_rx);

        let outcomes = registry.broadcast("resume,5").await;
        let dead_outcome = outcomes
            .iter()
            .find(|(id, _)| *id == dead_id)
            .map(|(_, outcome)| *outcome);
        assert_eq!(dead_outcome, Some(SendOutcome::Failed));
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.snapshot().await[0].conn_id(), live.conn_id());
        assert_eq!(drain_texts(&mut live_rx), vec!["resume,5".to_string()]);
    }
}
