//! Counters for live connections

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters updated by a connection's loops
#[derive(Debug)]
pub struct ConnectionCounters {
    opened_at: Instant,
    frames_read: AtomicU64,
    messages_written: AtomicU64,
    bytes_written: AtomicU64,
    pings_sent: AtomicU64,
}

impl ConnectionCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            opened_at: Instant::now(),
            frames_read: AtomicU64::new(0),
            messages_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            pings_sent: AtomicU64::new(0),
        }
    }

    /// Record a frame read from the transport
    pub fn frame_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a data message written to the transport
    pub fn message_written(&self, bytes: usize) {
        self.messages_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a keepalive ping
    pub fn ping_sent(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot
    pub fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            messages_written: self.messages_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            duration: self.opened_at.elapsed(),
        }
    }
}

impl Default for ConnectionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Frames read from the peer
    pub frames_read: u64,
    /// Data messages written to the peer
    pub messages_written: u64,
    /// Payload bytes written to the peer
    pub bytes_written: u64,
    /// Keepalive pings sent
    pub pings_sent: u64,
    /// Time since the connection was opened
    pub duration: Duration,
}

/// Registry statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Channels with at least one connection
    pub channels: usize,
    /// Connections across all channels
    pub connections: usize,
}
