//! Channel-to-connection directory
//!
//! The registry maps a channel name (a bin id) to the live connections
//! viewing it, and keeps the notification backend's subscriptions in step:
//! the first connection on a channel subscribes it, the last one to leave
//! unsubscribes it.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ConnectionRegistry>
//!                 ┌───────────────────────────────┐
//!                 │ channels: RwLock<HashMap<     │
//!                 │   bin, HashMap<id, Viewer>    │
//!                 │ >>                            │
//!                 │ backend: Arc<dyn PubSub>      │
//!                 └───────────────┬───────────────┘
//!                                 │ send(bin, payload)
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!   delivery task           delivery task           delivery task
//!   write() in order        write() in order        write() in order
//!   [Connection]            [Connection]            [Connection]
//! ```
//!
//! # Locking
//!
//! One coarse lock guards the whole map. Viewer counts per bin are small
//! (tens, not thousands), and `send` only holds the read lock long enough to
//! queue the payload for each connection's delivery task; the writes
//! themselves happen on those tasks. Subscribe and unsubscribe calls are made
//! under the write lock so that backend state always follows the order of
//! local changes.

pub mod error;
pub mod store;

pub use error::RegistryError;
pub use store::ConnectionRegistry;
