//! Redis pub/sub backend
//!
//! Publishing goes through a multiplexed connection. Subscriptions live on a
//! dedicated pub/sub connection owned by a subscriber task, which also reads
//! incoming messages; subscribe and unsubscribe requests reach it over a
//! command channel.
//!
//! ```text
//!   RedisPubSub ── publish ──────────────► MultiplexedConnection
//!        │
//!        └── (un)subscribe ──► subscriber task ◄──► aio::PubSub
//!                                    │ on_message
//!                                    ▼
//!                            RedisReceiver::receive
//! ```

use ::redis::aio::{MultiplexedConnection, PubSub as PubSubConnection};
use ::redis::{AsyncCommands, Client, Msg, RedisError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};

use super::{Notification, NotificationSource, PubSub};
use crate::error::BackendError;

/// Pending subscribe/unsubscribe requests
const COMMAND_CAPACITY: usize = 64;

type Reply = oneshot::Sender<Result<(), BackendError>>;

enum Command {
    Subscribe(String, Reply),
    Unsubscribe(String, Reply),
}

enum Event {
    Command(Option<Command>),
    Message(Option<Msg>),
}

/// Publisher and subscription side of a Redis backend
///
/// Cloning shares both connections. Once every handle is dropped the
/// subscriber task stops and [`RedisReceiver::receive`] fails with
/// [`BackendError::Closed`].
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: MultiplexedConnection,
    commands: mpsc::Sender<Command>,
}

/// Receiving side of a Redis backend
pub struct RedisReceiver {
    rx: mpsc::Receiver<Result<Notification, BackendError>>,
}

impl RedisPubSub {
    /// Connect to the server at `url`
    ///
    /// `capacity` bounds the notifications queued for the receiver. When the
    /// receiver falls that far behind, further messages are dropped.
    pub async fn connect(url: &str, capacity: usize) -> Result<(Self, RedisReceiver), BackendError> {
        let client = Client::open(url).map_err(backend_error)?;

        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend_error)?;

        #[allow(deprecated)]
        let subscriber = client
            .get_async_connection()
            .await
            .map_err(backend_error)?
            .into_pubsub();

        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (notifications, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_subscriber(subscriber, command_rx, notifications));

        tracing::info!("Connected to redis");
        Ok((Self { publisher, commands }, RedisReceiver { rx }))
    }

    async fn request(
        &self,
        command: Command,
        response: oneshot::Receiver<Result<(), BackendError>>,
    ) -> Result<(), BackendError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BackendError::Closed)?;
        response.await.map_err(|_| BackendError::Closed)?
    }
}

#[async_trait]
impl PubSub for RedisPubSub {
    async fn subscribe(&self, channel: &str) -> Result<(), BackendError> {
        let (reply, response) = oneshot::channel();
        self.request(Command::Subscribe(channel.to_string(), reply), response)
            .await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BackendError> {
        let (reply, response) = oneshot::channel();
        self.request(Command::Unsubscribe(channel.to_string(), reply), response)
            .await
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<usize, BackendError> {
        let mut conn = self.publisher.clone();
        conn.publish(channel, &payload[..])
            .await
            .map_err(backend_error)
    }
}

#[async_trait]
impl NotificationSource for RedisReceiver {
    async fn receive(&mut self) -> Result<Notification, BackendError> {
        match self.rx.recv().await {
            Some(result) => result,
            None => Err(BackendError::Closed),
        }
    }
}

/// Own the pub/sub connection until every publisher handle is gone
async fn run_subscriber(
    mut conn: PubSubConnection,
    mut commands: mpsc::Receiver<Command>,
    notifications: mpsc::Sender<Result<Notification, BackendError>>,
) {
    loop {
        let event = tokio::select! {
            command = commands.recv() => Event::Command(command),
            message = next_message(&mut conn) => Event::Message(message),
        };

        match event {
            Event::Command(Some(Command::Subscribe(channel, reply))) => {
                let result = conn.subscribe(channel.as_str()).await.map_err(backend_error);
                let _ = reply.send(result);
            }
            Event::Command(Some(Command::Unsubscribe(channel, reply))) => {
                let result = conn.unsubscribe(channel.as_str()).await.map_err(backend_error);
                let _ = reply.send(result);
            }
            Event::Command(None) => {
                tracing::debug!("Redis subscriber stopped");
                return;
            }
            Event::Message(Some(msg)) => {
                let notification = to_notification(&msg);
                match notifications.try_send(Ok(notification)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(channel = %msg.get_channel_name(), "Notification dropped, receiver lagging");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
            Event::Message(None) => {
                tracing::warn!("Redis subscription stream ended");
                let _ = notifications.try_send(Err(BackendError::Failed(
                    "subscription stream ended".into(),
                )));
                return;
            }
        }
    }
}

async fn next_message(conn: &mut PubSubConnection) -> Option<Msg> {
    let mut messages = std::pin::pin!(conn.on_message());
    messages.next().await
}

fn to_notification(msg: &Msg) -> Notification {
    Notification::new(
        msg.get_channel_name(),
        Bytes::copy_from_slice(msg.get_payload_bytes()),
    )
}

fn backend_error(e: RedisError) -> BackendError {
    BackendError::Failed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisPubSub::connect("not a redis url", 8).await;
        assert!(matches!(result, Err(BackendError::Failed(_))));
    }

    #[tokio::test]
    async fn test_connect_unreachable() {
        let result = RedisPubSub::connect("redis://127.0.0.1:1/", 8).await;
        assert!(matches!(result, Err(BackendError::Failed(_))));
    }

    #[tokio::test]
    async fn test_receiver_forwards_then_closes() {
        let (tx, rx) = mpsc::channel(4);
        let mut receiver = RedisReceiver { rx };

        tx.send(Ok(Notification::new("bin", "one"))).await.unwrap();
        tx.send(Err(BackendError::Failed("subscription stream ended".into())))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(receiver.receive().await, Ok(Notification::new("bin", "one")));
        assert!(matches!(receiver.receive().await, Err(BackendError::Failed(_))));
        assert_eq!(receiver.receive().await, Err(BackendError::Closed));
    }

    #[test]
    fn test_error_mapping() {
        let e = RedisError::from((::redis::ErrorKind::IoError, "connection reset"));
        match backend_error(e) {
            BackendError::Failed(msg) => assert!(msg.contains("connection reset"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
