//! Bin storage
//!
//! A bin is a named, expiring history of request records. [`BinStore`] keeps
//! bins in memory; records are stored as their serialized JSON so that what
//! is replayed from history is byte-for-byte what was streamed live.

pub mod memory;
pub mod name;
pub mod record;

pub use memory::{BinStore, MAX_BIN_TTL};
pub use name::random_name;
pub use record::{unix_now, RequestRecord};
