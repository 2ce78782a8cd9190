//! Notification backend contracts
//!
//! The fan-out layer talks to its publish/subscribe backend through two
//! traits. [`PubSub`] is shared by everything that changes subscriptions or
//! publishes; [`NotificationSource`] is the single receiving end drained by
//! the [`NotificationPump`](crate::pump::NotificationPump).
//!
//! ```text
//!   Geobin::record ── publish(bin) ──┐
//!                                    ▼
//!   ConnectionRegistry ── (un)subscribe ──► backend ──► NotificationSource
//!                                                            │ receive()
//!                                                            ▼
//!                                                     NotificationPump
//! ```
//!
//! [`MemoryBroker`] implements both traits in-process; [`RedisPubSub`] and
//! [`RedisReceiver`] implement them over a Redis server.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendError;

pub use memory::{MemoryBroker, MemoryReceiver};
pub use self::redis::{RedisPubSub, RedisReceiver};

/// A message delivered on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Channel the message was published on
    pub channel: String,
    /// Message body
    pub payload: Bytes,
}

impl Notification {
    /// Create a notification
    pub fn new(channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Subscription management and publishing
#[async_trait]
pub trait PubSub: Send + Sync + 'static {
    /// Start receiving messages published on `channel`
    ///
    /// Subscribing to a channel that is already subscribed is a no-op.
    async fn subscribe(&self, channel: &str) -> Result<(), BackendError>;

    /// Stop receiving messages published on `channel`
    async fn unsubscribe(&self, channel: &str) -> Result<(), BackendError>;

    /// Publish a message, returning how many receivers it reached
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<usize, BackendError>;
}

/// Receiving end of the backend
#[async_trait]
pub trait NotificationSource: Send + 'static {
    /// Wait for the next message on any subscribed channel
    ///
    /// An error is terminal; callers should not retry.
    async fn receive(&mut self) -> Result<Notification, BackendError>;
}
