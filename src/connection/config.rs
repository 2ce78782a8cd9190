//! Connection configuration

use std::time::Duration;

/// Default outbound queue capacity (messages)
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Default deadline for a single transport write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default keepalive ping period
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Per-connection options
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Outbound queue capacity; `write` waits when the queue is full
    pub outbound_capacity: usize,

    /// Deadline for each transport write (data and pings)
    pub write_timeout: Duration,

    /// Period between keepalive pings
    pub ping_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

impl ConnectionConfig {
    /// Set the outbound queue capacity
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Set the write deadline
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the keepalive period
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Check that the options are usable
    ///
    /// The keepalive period must exceed the write deadline, otherwise a slow
    /// but healthy peer gets pinged while a write is still pending.
    pub fn validate(&self) -> Result<(), String> {
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be at least 1".into());
        }
        if self.write_timeout.is_zero() {
            return Err("write_timeout must be non-zero".into());
        }
        if self.ping_interval <= self.write_timeout {
            return Err(format!(
                "ping_interval ({:?}) must exceed write_timeout ({:?})",
                self.ping_interval, self.write_timeout
            ));
        }
        Ok(())
    }
}
