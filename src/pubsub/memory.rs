//! In-process pub/sub broker

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use super::{Notification, NotificationSource, PubSub};
use crate::error::BackendError;

/// Publisher and subscription side of an in-process broker
///
/// Cloning shares the same subscription set. Messages on channels nobody is
/// subscribed to are dropped, and `publish` reports zero receivers for them.
#[derive(Clone)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

struct Shared {
    subscribed: RwLock<HashSet<String>>,
    tx: mpsc::Sender<Notification>,
}

/// Receiving side of an in-process broker
///
/// `receive` fails with [`BackendError::Closed`] once every [`MemoryBroker`]
/// handle has been dropped.
pub struct MemoryReceiver {
    rx: mpsc::Receiver<Notification>,
}

impl MemoryBroker {
    /// Create a broker whose delivery queue holds `capacity` messages
    pub fn new(capacity: usize) -> (Self, MemoryReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let broker = Self {
            shared: Arc::new(Shared {
                subscribed: RwLock::new(HashSet::new()),
                tx,
            }),
        };
        (broker, MemoryReceiver { rx })
    }

    /// Whether `channel` is currently subscribed
    pub async fn is_subscribed(&self, channel: &str) -> bool {
        self.shared.subscribed.read().await.contains(channel)
    }

    /// Number of subscribed channels
    pub async fn subscription_count(&self) -> usize {
        self.shared.subscribed.read().await.len()
    }
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker").finish_non_exhaustive()
    }
}

#[async_trait]
impl PubSub for MemoryBroker {
    async fn subscribe(&self, channel: &str) -> Result<(), BackendError> {
        self.shared.subscribed.write().await.insert(channel.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BackendError> {
        self.shared.subscribed.write().await.remove(channel);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<usize, BackendError> {
        if !self.is_subscribed(channel).await {
            return Ok(0);
        }

        self.shared
            .tx
            .send(Notification::new(channel, payload))
            .await
            .map_err(|_| BackendError::Closed)?;
        Ok(1)
    }
}

#[async_trait]
impl NotificationSource for MemoryReceiver {
    async fn receive(&mut self) -> Result<Notification, BackendError> {
        self.rx.recv().await.ok_or(BackendError::Closed)
    }
}
