//! Error types
//!
//! Each layer has its own error type; [`Error`] wraps them for callers that
//! drive the whole application.

use std::time::Duration;

use crate::registry::RegistryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure (bind, accept)
    Io(std::io::Error),
    /// Transport read/write failure
    Transport(TransportError),
    /// Connection is closed or its queue is full
    Connection(ConnectionError),
    /// Registry lookup failure
    Registry(RegistryError),
    /// Pub/sub backend failure
    Backend(BackendError),
    /// JSON encoding/decoding failure
    Serialization(serde_json::Error),
    /// Bin does not exist or has expired
    BinNotFound(String),
    /// Invalid configuration
    Config(String),
    /// The notification pump stopped receiving
    PumpTerminated(BackendError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Backend(e) => write!(f, "Backend error: {}", e),
            Error::Serialization(e) => write!(f, "Serialization error: {}", e),
            Error::BinNotFound(bin) => write!(f, "Bin not found: {}", bin),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::PumpTerminated(e) => write!(f, "Notification pump terminated: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Transport(e) => Some(e),
            Error::Connection(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Backend(e) | Error::PumpTerminated(e) => Some(e),
            Error::Serialization(e) => Some(e),
            Error::BinNotFound(_) | Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::Backend(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e)
    }
}

/// Failure reported by a frame transport
#[derive(Debug)]
pub enum TransportError {
    /// The peer closed the stream
    Closed,
    /// A write did not complete before its deadline
    Timeout(Duration),
    /// Any other transport failure
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap an arbitrary transport error
    pub fn failed<E>(e: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TransportError::Failed(e.into())
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Closed => write!(f, "Transport closed"),
            TransportError::Timeout(d) => write!(f, "Write timed out after {:?}", d),
            TransportError::Failed(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failure to enqueue an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// Connection has been closed
    Closed,
    /// Outbound queue is at capacity (only from `try_write`)
    QueueFull,
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Closed => write!(f, "Connection closed"),
            ConnectionError::QueueFull => write!(f, "Outbound queue full"),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Failure reported by the pub/sub backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend connection is gone; no further messages will arrive
    Closed,
    /// A subscribe/unsubscribe/publish call failed
    Failed(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Closed => write!(f, "Backend closed"),
            BackendError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BackendError {}
