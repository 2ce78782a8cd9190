//! Connection lifecycle state

use std::fmt;

/// Connection lifecycle phase
///
/// ```text
/// Open ──► Active ──► Closing ──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionPhase {
    /// Handle created, loops not yet running
    Open,
    /// Read and write loops running
    Active,
    /// Transport being released
    Closing,
    /// Transport released and close handler has run
    Closed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Open => "open",
            ConnectionPhase::Active => "active",
            ConnectionPhase::Closing => "closing",
            ConnectionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Connection identifier, unique within its channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
