//! Registry error types

use crate::connection::ConnectionId;
use crate::error::BackendError;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Channel or connection is not registered
    NotFound {
        channel: String,
        connection: ConnectionId,
    },
    /// No connections are registered for the channel
    ///
    /// Expected when a notification outlives its last viewer.
    UnknownChannel(String),
    /// The connection was removed but the backend unsubscribe failed
    Unsubscribe {
        channel: String,
        source: BackendError,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::NotFound {
                channel,
                connection,
            } => write!(f, "Connection not found: {}/{}", channel, connection),
            RegistryError::UnknownChannel(channel) => write!(f, "Unknown channel: {}", channel),
            RegistryError::Unsubscribe { channel, source } => {
                write!(f, "Failed to unsubscribe from {}: {}", channel, source)
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Unsubscribe { source, .. } => Some(source),
            _ => None,
        }
    }
}
