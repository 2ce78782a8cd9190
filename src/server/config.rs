//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::connection::ConnectionConfig;
use crate::store::name::{DEFAULT_ALPHABET, DEFAULT_NAME_LENGTH};
use crate::store::MAX_BIN_TTL;

/// Default bin lifetime
pub const DEFAULT_BIN_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent viewer connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Options applied to every viewer connection
    pub connection: ConnectionConfig,

    /// Characters bin names are drawn from
    pub bin_name_alphabet: String,

    /// Length of generated bin names
    pub bin_name_length: usize,

    /// Lifetime of a bin from its creation
    pub bin_ttl: Duration,

    /// Messages the in-process broker queues before publishers wait
    pub broker_capacity: usize,

    /// How often expired bins are purged
    pub purge_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,
            connection: ConnectionConfig::default(),
            bin_name_alphabet: DEFAULT_ALPHABET.to_string(),
            bin_name_length: DEFAULT_NAME_LENGTH,
            bin_ttl: DEFAULT_BIN_TTL,
            broker_capacity: 1024,
            purge_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set per-connection options
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Set the bin name alphabet and length
    pub fn bin_names(mut self, alphabet: impl Into<String>, length: usize) -> Self {
        self.bin_name_alphabet = alphabet.into();
        self.bin_name_length = length;
        self
    }

    /// Set the bin lifetime
    pub fn bin_ttl(mut self, ttl: Duration) -> Self {
        self.bin_ttl = ttl;
        self
    }

    /// Set the broker queue capacity
    pub fn broker_capacity(mut self, capacity: usize) -> Self {
        self.broker_capacity = capacity;
        self
    }

    /// Set the purge interval
    pub fn purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Check that the options are usable
    pub fn validate(&self) -> Result<(), String> {
        self.connection.validate()?;

        if self.bin_name_alphabet.is_empty() {
            return Err("bin_name_alphabet must not be empty".into());
        }
        if self.bin_name_length == 0 {
            return Err("bin_name_length must be at least 1".into());
        }
        if self.bin_ttl.is_zero() {
            return Err("bin_ttl must be non-zero".into());
        }
        if self.bin_ttl > MAX_BIN_TTL {
            return Err(format!("bin_ttl must be at most {}s", MAX_BIN_TTL.as_secs()));
        }
        if self.broker_capacity == 0 {
            return Err("broker_capacity must be at least 1".into());
        }
        if self.purge_interval.is_zero() {
            return Err("purge_interval must be non-zero".into());
        }
        Ok(())
    }
}
