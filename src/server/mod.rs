//! Geobin service and websocket listener
//!
//! ```text
//!   TCP ──► GeobinServer ──► handshake (/api/1/ws/{bin}) ──► Geobin::attach_viewer
//!                                                              │
//!   HTTP layer ──► Geobin::{create_bin, record, history, counts}
//!                      │ record: store + publish(bin)
//!                      ▼
//!                  PubSub ──► NotificationPump ──► ConnectionRegistry ──► viewers
//! ```

pub mod config;
pub mod listener;
pub mod service;

pub use config::ServerConfig;
pub use listener::GeobinServer;
pub use service::{BinInfo, Geobin};
