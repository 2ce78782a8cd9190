//! Disposable request bins with geo detection and live websocket fan-out
//!
//! A bin accepts arbitrary request payloads, stores them for a limited time
//! and streams each new one to every connected viewer. Every payload is
//! scanned for geospatial data on the way in, so stored and streamed records
//! carry the findings next to the raw body.
//!
//! # Architecture
//!
//! ```text
//!   record(bin, body)
//!        │
//!        ├──► geo::extract ──► RequestRecord { timestamp, headers, body, geo }
//!        │
//!        ├──► BinStore::append (history, newest first, expiring)
//!        │
//!        └──► PubSub::publish(bin)
//!                   │
//!                   ▼
//!          NotificationSource ──► NotificationPump ──► ConnectionRegistry::send(bin)
//!                                                             │
//!                                        ┌────────────────────┼────────────────────┐
//!                                        ▼                    ▼                    ▼
//!                                   Connection           Connection           Connection
//!                                (queue ─► ws)        (queue ─► ws)        (queue ─► ws)
//! ```
//!
//! The registry subscribes a bin on the backend when its first viewer
//! arrives and unsubscribes it when the last one leaves.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use geobin::{Geobin, GeobinServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> geobin::Result<()> {
//!     let (app, receiver) = Geobin::in_memory(ServerConfig::default())?;
//!     let app = Arc::new(app);
//!     app.spawn_pump(receiver);
//!
//!     let bin = app.create_bin().await?;
//!     println!("viewers connect to /api/1/ws/{}", bin.id);
//!
//!     GeobinServer::new(app).run().await
//! }
//! ```

pub mod connection;
pub mod error;
pub mod geo;
pub mod pubsub;
pub mod pump;
pub mod registry;
pub mod server;
pub mod stats;
pub mod store;

pub use connection::{Connection, ConnectionConfig, ConnectionHandler, ConnectionId, Frame, FrameType};
pub use error::{BackendError, ConnectionError, Error, Result, TransportError};
pub use geo::{extract, extract_sequential, GeoFinding, PathSegment};
pub use pubsub::{
    MemoryBroker, MemoryReceiver, Notification, NotificationSource, PubSub, RedisPubSub, RedisReceiver,
};
pub use pump::NotificationPump;
pub use registry::{ConnectionRegistry, RegistryError};
pub use server::{BinInfo, Geobin, GeobinServer, ServerConfig};
pub use store::{BinStore, RequestRecord};
