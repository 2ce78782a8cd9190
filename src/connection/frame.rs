//! Transport frame types

use bytes::Bytes;

/// Kind of frame carried by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// UTF-8 text data
    Text,
    /// Binary data
    Binary,
    /// Keepalive ping
    Ping,
    /// Keepalive reply
    Pong,
    /// Peer is closing the connection
    Close,
}

/// A single frame read from or written to a transport
///
/// Cheap to clone; the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Kind of frame
    pub frame_type: FrameType,
    /// Frame payload
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    /// Create a text frame
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Text, payload)
    }

    /// Create a binary frame
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Binary, payload)
    }

    /// Create an empty ping frame
    pub fn ping() -> Self {
        Self::new(FrameType::Ping, Bytes::new())
    }

    /// Create an empty close frame
    pub fn close() -> Self {
        Self::new(FrameType::Close, Bytes::new())
    }

    /// Whether this frame carries application data
    pub fn is_data(&self) -> bool {
        matches!(self.frame_type, FrameType::Text | FrameType::Binary)
    }
}
