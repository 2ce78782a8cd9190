//! Backend-to-registry bridge
//!
//! One pump runs per process. It drains the backend's receive loop and hands
//! every message to [`ConnectionRegistry::send`]. A message for a channel
//! with no viewers left is expected and only logged; a receive failure ends
//! the pump, since the process can no longer deliver live updates.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::pubsub::{Notification, NotificationSource};
use crate::registry::{ConnectionRegistry, RegistryError};

/// Forwards backend notifications to registered connections
pub struct NotificationPump<S> {
    source: S,
    registry: Arc<ConnectionRegistry>,
}

impl<S: NotificationSource> NotificationPump<S> {
    /// Create a pump over a receiving backend handle
    pub fn new(source: S, registry: Arc<ConnectionRegistry>) -> Self {
        Self { source, registry }
    }

    /// Run until the backend fails
    ///
    /// Only returns with [`Error::PumpTerminated`].
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Notification pump started");

        loop {
            let notification = match self.source.receive().await {
                Ok(notification) => notification,
                Err(e) => {
                    tracing::error!(error = %e, "Notification pump terminated");
                    return Err(Error::PumpTerminated(e));
                }
            };

            dispatch(&self.registry, notification).await;
        }
    }

    /// Run until the backend fails or `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run() => result,
            _ = shutdown => {
                tracing::info!("Notification pump stopped");
                Ok(())
            }
        }
    }

    /// Run on a background task
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}

async fn dispatch(registry: &ConnectionRegistry, notification: Notification) {
    let Notification { channel, payload } = notification;

    match registry.send(&channel, payload).await {
        Ok(count) => {
            tracing::debug!(channel = %channel, connections = count, "Notification forwarded");
        }
        Err(RegistryError::UnknownChannel(_)) => {
            tracing::debug!(channel = %channel, "Notification for channel without viewers");
        }
        Err(e) => {
            tracing::warn!(channel = %channel, error = %e, "Notification dropped");
        }
    }
}
