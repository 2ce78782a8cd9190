//! Connection registry implementation

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use super::error::RegistryError;
use crate::connection::{Connection, ConnectionId};
use crate::pubsub::PubSub;
use crate::stats::RegistryStats;

/// A registered connection and its ordered delivery queue
///
/// Payloads are handed to a per-connection task that writes them one at a
/// time, so a connection sees messages in the order `send` accepted them and
/// a full outbound queue only stalls that connection's task.
struct Viewer {
    conn: Connection,
    deliveries: mpsc::UnboundedSender<Bytes>,
}

impl Viewer {
    fn new(conn: Connection) -> Self {
        let (deliveries, mut pending) = mpsc::unbounded_channel::<Bytes>();
        let writer = conn.clone();
        tokio::spawn(async move {
            while let Some(payload) = pending.recv().await {
                if let Err(e) = writer.write(payload).await {
                    tracing::debug!(connection = %writer.id(), error = %e, "Dropped message");
                    break;
                }
            }
        });

        Self { conn, deliveries }
    }

    fn deliver(&self, payload: Bytes) {
        if self.deliveries.send(payload).is_err() {
            tracing::debug!(connection = %self.conn.id(), "Dropped message, connection closed");
        }
    }
}

/// Directory of live connections, keyed by channel then connection id
///
/// Constructed explicitly and shared through an `Arc`; there is no global
/// instance.
pub struct ConnectionRegistry {
    /// Map of channel to its connections
    channels: RwLock<HashMap<String, HashMap<ConnectionId, Viewer>>>,

    /// Backend whose subscriptions track the set of non-empty channels
    backend: Arc<dyn PubSub>,
}

impl ConnectionRegistry {
    /// Create an empty registry over a backend
    pub fn new(backend: Arc<dyn PubSub>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            backend,
        }
    }

    /// Register a connection under a channel
    ///
    /// The connection is keyed by its own id; re-adding the same id replaces
    /// the previous handle. The first connection on a channel subscribes the
    /// channel on the backend. A subscribe failure is logged and the
    /// connection stays registered.
    pub async fn add(&self, channel: &str, conn: Connection) {
        let mut channels = self.channels.write().await;
        let id = conn.id().clone();

        if let Some(conns) = channels.get_mut(channel) {
            conns.insert(id.clone(), Viewer::new(conn));
            tracing::debug!(
                channel = %channel,
                connection = %id,
                connections = conns.len(),
                "Connection added"
            );
            return;
        }

        let mut conns = HashMap::new();
        conns.insert(id.clone(), Viewer::new(conn));
        channels.insert(channel.to_string(), conns);

        match self.backend.subscribe(channel).await {
            Ok(()) => tracing::info!(channel = %channel, connection = %id, "Channel subscribed"),
            Err(e) => tracing::warn!(channel = %channel, error = %e, "Subscribe failed"),
        }
    }

    /// Look up a connection
    pub async fn get(&self, channel: &str, id: &ConnectionId) -> Option<Connection> {
        let channels = self.channels.read().await;
        channels
            .get(channel)
            .and_then(|conns| conns.get(id))
            .map(|viewer| viewer.conn.clone())
    }

    /// Remove a connection
    ///
    /// Removing the last connection of a channel drops the channel and
    /// unsubscribes it on the backend. If that call fails the local removal
    /// still stands and the failure is returned.
    pub async fn delete(&self, channel: &str, id: &ConnectionId) -> Result<(), RegistryError> {
        let mut channels = self.channels.write().await;

        let not_found = || RegistryError::NotFound {
            channel: channel.to_string(),
            connection: id.clone(),
        };

        let conns = channels.get_mut(channel).ok_or_else(not_found)?;
        conns.remove(id).ok_or_else(not_found)?;

        if !conns.is_empty() {
            tracing::debug!(
                channel = %channel,
                connection = %id,
                connections = conns.len(),
                "Connection removed"
            );
            return Ok(());
        }

        channels.remove(channel);

        match self.backend.unsubscribe(channel).await {
            Ok(()) => {
                tracing::info!(channel = %channel, connection = %id, "Channel unsubscribed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Unsubscribe failed");
                Err(RegistryError::Unsubscribe {
                    channel: channel.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Deliver a payload to every connection on a channel
    ///
    /// Writes are queued on each connection's delivery task and not awaited,
    /// so a slow or dead connection never delays the others. Payloads sent
    /// to one channel reach each of its connections in call order. Returns
    /// the number of connections the payload was dispatched to.
    pub async fn send(&self, channel: &str, payload: Bytes) -> Result<usize, RegistryError> {
        let channels = self.channels.read().await;
        let conns = channels
            .get(channel)
            .ok_or_else(|| RegistryError::UnknownChannel(channel.to_string()))?;

        let count = conns.len();
        for viewer in conns.values() {
            viewer.deliver(payload.clone());
        }

        tracing::debug!(channel = %channel, connections = count, "Message dispatched");
        Ok(count)
    }

    /// Number of connections on a channel
    pub async fn connection_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(channel).map_or(0, HashMap::len)
    }

    /// Whether a channel has any connections
    pub async fn has_channel(&self, channel: &str) -> bool {
        self.channels.read().await.contains_key(channel)
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let channels = self.channels.read().await;
        RegistryStats {
            channels: channels.len(),
            connections: channels.values().map(HashMap::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::connection::{channel_transport, ConnectionConfig, Frame, NoopHandler, Peer};
    use crate::error::BackendError;

    /// Backend double counting calls per channel
    #[derive(Default)]
    struct CountingPubSub {
        subscribes: Mutex<HashMap<String, usize>>,
        unsubscribes: Mutex<HashMap<String, usize>>,
        fail_unsubscribe: bool,
    }

    impl CountingPubSub {
        fn failing() -> Self {
            Self {
                fail_unsubscribe: true,
                ..Self::default()
            }
        }

        fn subscribes(&self, channel: &str) -> usize {
            *self.subscribes.lock().unwrap().get(channel).unwrap_or(&0)
        }

        fn unsubscribes(&self, channel: &str) -> usize {
            *self.unsubscribes.lock().unwrap().get(channel).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl PubSub for CountingPubSub {
        async fn subscribe(&self, channel: &str) -> Result<(), BackendError> {
            *self.subscribes.lock().unwrap().entry(channel.to_string()).or_default() += 1;
            Ok(())
        }

        async fn unsubscribe(&self, channel: &str) -> Result<(), BackendError> {
            *self.unsubscribes.lock().unwrap().entry(channel.to_string()).or_default() += 1;
            if self.fail_unsubscribe {
                return Err(BackendError::Failed("connection reset".into()));
            }
            Ok(())
        }

        async fn publish(&self, _channel: &str, _payload: Bytes) -> Result<usize, BackendError> {
            Ok(0)
        }
    }

    fn open(id: &str) -> (Connection, Peer) {
        let (source, sink, peer) = channel_transport(16);
        let conn = Connection::open(
            ConnectionId::new(id),
            source,
            sink,
            Arc::new(NoopHandler),
            &ConnectionConfig::default(),
        );
        (conn, peer)
    }

    #[tokio::test]
    async fn test_add_get() {
        let backend = Arc::new(CountingPubSub::default());
        let registry = ConnectionRegistry::new(backend.clone());
        let (conn, _peer) = open("a");

        registry.add("bin", conn).await;

        let found = registry.get("bin", &ConnectionId::new("a")).await.unwrap();
        assert_eq!(found.id().as_str(), "a");
        assert!(registry.get("bin", &ConnectionId::new("b")).await.is_none());
        assert!(registry.get("other", &ConnectionId::new("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_on_first_add_only() {
        let backend = Arc::new(CountingPubSub::default());
        let registry = ConnectionRegistry::new(backend.clone());
        let (a, _pa) = open("a");
        let (b, _pb) = open("b");

        registry.add("bin", a).await;
        registry.add("bin", b).await;

        assert_eq!(backend.subscribes("bin"), 1);
        assert_eq!(registry.connection_count("bin").await, 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_on_last_delete_only() {
        let backend = Arc::new(CountingPubSub::default());
        let registry = ConnectionRegistry::new(backend.clone());
        let (a, _pa) = open("a");
        let (b, _pb) = open("b");

        registry.add("bin", a).await;
        registry.add("bin", b).await;

        registry.delete("bin", &ConnectionId::new("a")).await.unwrap();
        assert_eq!(backend.unsubscribes("bin"), 0);
        assert!(registry.has_channel("bin").await);

        registry.delete("bin", &ConnectionId::new("b")).await.unwrap();
        assert_eq!(backend.unsubscribes("bin"), 1);
        assert!(!registry.has_channel("bin").await);
    }

    #[tokio::test]
    async fn test_resubscribe_after_empty() {
        let backend = Arc::new(CountingPubSub::default());
        let registry = ConnectionRegistry::new(backend.clone());
        let (a, _pa) = open("a");
        let (b, _pb) = open("b");

        registry.add("bin", a).await;
        registry.delete("bin", &ConnectionId::new("a")).await.unwrap();
        registry.add("bin", b).await;

        assert_eq!(backend.subscribes("bin"), 2);
        assert_eq!(backend.unsubscribes("bin"), 1);
    }

    #[tokio::test]
    async fn test_delete_not_found() {
        let backend = Arc::new(CountingPubSub::default());
        let registry = ConnectionRegistry::new(backend.clone());
        let (a, _pa) = open("a");

        let result = registry.delete("bin", &ConnectionId::new("a")).await;
        assert!(matches!(result, Err(RegistryError::NotFound { .. })));

        registry.add("bin", a).await;
        let result = registry.delete("bin", &ConnectionId::new("zzz")).await;
        assert_eq!(
            result,
            Err(RegistryError::NotFound {
                channel: "bin".into(),
                connection: ConnectionId::new("zzz"),
            })
        );
        assert_eq!(backend.unsubscribes("bin"), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_failure_still_removes() {
        let backend = Arc::new(CountingPubSub::failing());
        let registry = ConnectionRegistry::new(backend.clone());
        let (a, _pa) = open("a");

        registry.add("bin", a).await;
        let result = registry.delete("bin", &ConnectionId::new("a")).await;

        assert!(matches!(result, Err(RegistryError::Unsubscribe { .. })));
        assert!(!registry.has_channel("bin").await);
        assert!(registry.get("bin", &ConnectionId::new("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_send_unknown_channel() {
        let registry = ConnectionRegistry::new(Arc::new(CountingPubSub::default()));

        let result = registry.send("nobody", Bytes::from_static(b"{}")).await;
        assert_eq!(result, Err(RegistryError::UnknownChannel("nobody".into())));
    }

    #[tokio::test]
    async fn test_send_fans_out_to_channel_only() {
        let registry = ConnectionRegistry::new(Arc::new(CountingPubSub::default()));

        let mut viewers = Vec::new();
        for i in 0..100 {
            let (conn, peer) = open(&format!("viewer-{}", i));
            registry.add("bin", conn).await;
            viewers.push(peer);
        }

        let mut bystanders = Vec::new();
        for i in 0..5 {
            let (conn, peer) = open(&format!("other-{}", i));
            registry.add("other", conn).await;
            bystanders.push(peer);
        }

        let sent = registry.send("bin", Bytes::from_static(b"{\"n\":1}")).await.unwrap();
        assert_eq!(sent, 100);

        for peer in viewers.iter_mut() {
            let frame = tokio::time::timeout(Duration::from_secs(2), peer.recv_data())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(frame, Frame::text(Bytes::from_static(b"{\"n\":1}")));
        }

        for peer in bystanders.iter_mut() {
            let nothing = tokio::time::timeout(Duration::from_millis(50), peer.recv_data()).await;
            assert!(nothing.is_err());
        }
    }

    #[tokio::test]
    async fn test_send_skips_closed_connection() {
        let registry = ConnectionRegistry::new(Arc::new(CountingPubSub::default()));
        let (dead, _dead_peer) = open("dead");
        let (live, mut live_peer) = open("live");

        dead.close();
        dead.closed().await;
        registry.add("bin", dead).await;
        registry.add("bin", live).await;

        assert_eq!(registry.send("bin", Bytes::from_static(b"hi")).await.unwrap(), 2);

        let frame = tokio::time::timeout(Duration::from_secs(2), live_peer.recv_data())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload, Bytes::from_static(b"hi"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_send_preserves_order() {
        let registry = ConnectionRegistry::new(Arc::new(CountingPubSub::default()));
        let (conn, mut peer) = open("viewer");
        registry.add("bin", conn).await;

        for i in 0..200u32 {
            registry.send("bin", Bytes::from(i.to_string())).await.unwrap();
        }

        let mut received = Vec::with_capacity(200);
        while received.len() < 200 {
            let frame = tokio::time::timeout(Duration::from_secs(5), peer.recv_data())
                .await
                .unwrap()
                .unwrap();
            let n: u32 = std::str::from_utf8(&frame.payload).unwrap().parse().unwrap();
            received.push(n);
        }

        let expected: Vec<u32> = (0..200).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = ConnectionRegistry::new(Arc::new(CountingPubSub::default()));
        let (a, _pa) = open("a");
        let (b, _pb) = open("b");
        let (c, _pc) = open("c");

        registry.add("one", a).await;
        registry.add("one", b).await;
        registry.add("two", c).await;

        let stats = registry.stats().await;
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.connections, 3);
    }
}
