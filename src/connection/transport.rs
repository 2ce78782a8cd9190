//! Frame transport contracts
//!
//! A duplex transport is handed to a [`Connection`](super::Connection) as two
//! owned halves so that the read loop and the write loop never contend for
//! it. Write deadlines are enforced by the caller, not the sink.
//!
//! [`channel_transport`] builds an in-process transport backed by tokio
//! channels, with a [`Peer`] standing in for the remote end.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::frame::Frame;
use crate::error::TransportError;

/// Read half of a transport
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Wait for the next frame
    ///
    /// Returns `TransportError::Closed` once the peer has gone away.
    async fn read_frame(&mut self) -> Result<Frame, TransportError>;
}

/// Write half of a transport
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Write one frame
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the transport, releasing the underlying resource
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Create an in-process transport
///
/// Returns the two halves for the local side and a [`Peer`] for the remote
/// side. `capacity` bounds each direction.
pub fn channel_transport(capacity: usize) -> (ChannelSource, ChannelSink, Peer) {
    let (to_local, from_peer) = mpsc::channel(capacity);
    let (to_peer, from_local) = mpsc::channel(capacity);

    (
        ChannelSource { rx: from_peer },
        ChannelSink { tx: Some(to_peer) },
        Peer {
            tx: Some(to_local),
            rx: from_local,
        },
    )
}

/// Read half of an in-process transport
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Frame>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn read_frame(&mut self) -> Result<Frame, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

/// Write half of an in-process transport
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Frame>>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(tx) = self.tx.take() {
            // Best effort; the peer may already be gone
            let _ = tx.try_send(Frame::close());
        }
        Ok(())
    }
}

/// Remote end of an in-process transport
#[derive(Debug)]
pub struct Peer {
    tx: Option<mpsc::Sender<Frame>>,
    rx: mpsc::Receiver<Frame>,
}

impl Peer {
    /// Send a frame to the local side
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    /// Receive the next frame written by the local side
    ///
    /// Returns `None` once the local side has closed or dropped its sink.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Receive the next data frame, skipping keepalive and close frames
    pub async fn recv_data(&mut self) -> Option<Frame> {
        loop {
            let frame = self.rx.recv().await?;
            if frame.is_data() {
                return Some(frame);
            }
        }
    }

    /// Stop sending; the local read half sees `TransportError::Closed`
    pub fn hang_up(&mut self) {
        self.tx.take();
    }
}
