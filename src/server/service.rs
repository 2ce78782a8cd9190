//! Geobin application object
//!
//! Owns the bin store, the pub/sub backend and the connection registry, and
//! exposes the operations the HTTP layer maps onto routes: create a bin,
//! record a request, read history and counts, and attach a live viewer.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::config::ServerConfig;
use crate::connection::{Connection, ConnectionHandler, ConnectionId, FrameSink, FrameSource};
use crate::error::{Error, Result};
use crate::pubsub::{MemoryBroker, MemoryReceiver, NotificationSource, PubSub, RedisPubSub, RedisReceiver};
use crate::pump::NotificationPump;
use crate::registry::{ConnectionRegistry, RegistryError};
use crate::store::record::to_unix;
use crate::store::{random_name, BinStore, RequestRecord};

/// Attempts at finding an unused bin name before giving up
const MAX_NAME_ATTEMPTS: usize = 64;

/// A newly created bin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinInfo {
    /// Bin name
    pub id: String,
    /// Expiry in unix seconds
    pub expires: i64,
}

/// The geobin service
pub struct Geobin {
    config: ServerConfig,
    store: Arc<BinStore>,
    backend: Arc<dyn PubSub>,
    registry: Arc<ConnectionRegistry>,
}

impl Geobin {
    /// Create a service over an existing backend
    pub fn new(config: ServerConfig, backend: Arc<dyn PubSub>) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        Ok(Self {
            registry: Arc::new(ConnectionRegistry::new(Arc::clone(&backend))),
            store: Arc::new(BinStore::new()),
            backend,
            config,
        })
    }

    /// Create a service backed by an in-process broker
    ///
    /// The returned receiver should be handed to [`spawn_pump`](Self::spawn_pump).
    pub fn in_memory(config: ServerConfig) -> Result<(Self, MemoryReceiver)> {
        let (broker, receiver) = MemoryBroker::new(config.broker_capacity);
        let service = Self::new(config, Arc::new(broker))?;
        Ok((service, receiver))
    }

    /// Create a service backed by a Redis server
    ///
    /// The returned receiver should be handed to [`spawn_pump`](Self::spawn_pump).
    pub async fn redis(config: ServerConfig, url: &str) -> Result<(Self, RedisReceiver)> {
        config.validate().map_err(Error::Config)?;

        let (backend, receiver) = RedisPubSub::connect(url, config.broker_capacity).await?;
        let service = Self::new(config, Arc::new(backend))?;
        Ok((service, receiver))
    }

    /// Service configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Bin store
    pub fn store(&self) -> &Arc<BinStore> {
        &self.store
    }

    /// Create a bin with a fresh random name
    pub async fn create_bin(&self) -> Result<BinInfo> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let id = random_name(&self.config.bin_name_alphabet, self.config.bin_name_length);

            if let Some(expires_at) = self.store.create_new(&id, self.config.bin_ttl).await {
                let expires = to_unix(expires_at);
                tracing::info!(bin = %id, expires = expires, "Bin created");
                return Ok(BinInfo { id, expires });
            }
        }

        Err(Error::Config(format!(
            "no unused bin name found after {} attempts",
            MAX_NAME_ATTEMPTS
        )))
    }

    /// Store a request in a bin and publish it to live viewers
    ///
    /// A publish failure is logged; the request stays recorded.
    pub async fn record(
        &self,
        bin: &str,
        headers: BTreeMap<String, String>,
        body: &[u8],
    ) -> Result<RequestRecord> {
        if !self.store.exists(bin).await {
            return Err(Error::BinNotFound(bin.to_string()));
        }

        let record = RequestRecord::capture(headers, body).await;
        let json = record.to_json()?;
        let count = self.store.append(bin, json.clone()).await?;

        match self.backend.publish(bin, Bytes::from(json)).await {
            Ok(receivers) => tracing::debug!(
                bin = %bin,
                records = count,
                findings = record.geo.len(),
                receivers = receivers,
                "Request recorded"
            ),
            Err(e) => tracing::warn!(bin = %bin, error = %e, "Publish failed"),
        }

        Ok(record)
    }

    /// Requests stored in a bin, newest first
    pub async fn history(&self, bin: &str) -> Result<Vec<RequestRecord>> {
        let entries = self.store.history(bin).await?;

        Ok(entries
            .iter()
            .filter_map(|json| match RequestRecord::from_json(json) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(bin = %bin, error = %e, "Skipping unreadable history entry");
                    None
                }
            })
            .collect())
    }

    /// Request counts per bin; unknown or expired bins report 0
    pub async fn counts<I, B>(&self, bins: I) -> BTreeMap<String, usize>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<str>,
    {
        let mut counts = BTreeMap::new();
        for bin in bins {
            let bin = bin.as_ref();
            let count = self.store.count(bin).await.unwrap_or(0);
            counts.insert(bin.to_string(), count);
        }
        counts
    }

    /// Open a live viewer connection on a bin
    ///
    /// The connection is registered under the bin and removed again when it
    /// closes.
    pub async fn attach_viewer<R, W>(&self, bin: &str, source: R, sink: W) -> Result<Connection>
    where
        R: FrameSource,
        W: FrameSink,
    {
        if !self.store.exists(bin).await {
            return Err(Error::BinNotFound(bin.to_string()));
        }

        let handler = Arc::new(ViewerHandler {
            bin: bin.to_string(),
            registry: Arc::clone(&self.registry),
        });
        let conn = Connection::open(
            ConnectionId::generate(),
            source,
            sink,
            handler,
            &self.config.connection,
        );

        self.registry.add(bin, conn.clone()).await;

        // The connection may have closed before it was registered
        if conn.is_closed() {
            remove_viewer(&self.registry, bin, conn.id()).await;
        }

        tracing::info!(bin = %bin, connection = %conn.id(), "Viewer attached");
        Ok(conn)
    }

    /// Start the notification pump on a background task
    pub fn spawn_pump<S: NotificationSource>(&self, source: S) -> JoinHandle<Result<()>> {
        NotificationPump::new(source, Arc::clone(&self.registry)).spawn()
    }

    /// Start purging expired bins on a background task
    pub fn spawn_purge_task(&self) -> JoinHandle<()> {
        self.store.spawn_purge_task(self.config.purge_interval)
    }
}

/// Removes a viewer from the registry when its connection closes
struct ViewerHandler {
    bin: String,
    registry: Arc<ConnectionRegistry>,
}

#[async_trait]
impl ConnectionHandler for ViewerHandler {
    async fn on_close(&self, conn: &Connection) {
        remove_viewer(&self.registry, &self.bin, conn.id()).await;
        tracing::info!(bin = %self.bin, connection = %conn.id(), "Viewer detached");
    }
}

async fn remove_viewer(registry: &ConnectionRegistry, bin: &str, id: &ConnectionId) {
    match registry.delete(bin, id).await {
        Ok(()) => {}
        // Already removed by whichever side noticed the close first
        Err(RegistryError::NotFound { .. }) => {
            tracing::debug!(bin = %bin, connection = %id, "Viewer already removed");
        }
        Err(e) => tracing::warn!(bin = %bin, connection = %id, error = %e, "Viewer removal failed"),
    }
}
