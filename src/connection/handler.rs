//! Connection event handler

use async_trait::async_trait;

use super::frame::Frame;
use super::handle::Connection;

/// Receives events from a connection's loops
///
/// Both methods run on the connection's own tasks, never on the task that
/// called [`Connection::open`] or [`Connection::close`]. Closing the
/// connection from inside either method is allowed.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Called for every frame read from the peer, including keepalives
    async fn on_read(&self, conn: &Connection, frame: Frame) {
        let _ = (conn, frame);
    }

    /// Called exactly once, after the transport has been released
    async fn on_close(&self, conn: &Connection) {
        let _ = conn;
    }
}

/// Handler that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl ConnectionHandler for NoopHandler {}
