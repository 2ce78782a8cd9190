//! Duplex connections with bounded outbound queues
//!
//! A [`Connection`] owns one transport, split into a [`FrameSource`] and a
//! [`FrameSink`], and runs two tasks over it:
//!
//! ```text
//!              write()/try_write()
//!   callers ────────────────────────► mpsc (256) ──► write loop ──► FrameSink
//!                                                      │  ▲
//!                                         ping ticker ─┘  │ shutdown (watch)
//!                                                         │
//!   FrameSource ──► read loop ──► handler.on_read()       │
//!                      │                                  │
//!                      └──── error / close frame ─► close()
//! ```
//!
//! Every write to the transport carries a deadline. When either loop stops,
//! the connection shuts down: the sink is closed, the read loop is joined,
//! and [`ConnectionHandler::on_close`] runs exactly once.

pub mod config;
pub mod frame;
pub mod handle;
pub mod handler;
pub mod state;
pub mod transport;
pub mod websocket;

pub use config::ConnectionConfig;
pub use frame::{Frame, FrameType};
pub use handle::Connection;
pub use handler::{ConnectionHandler, NoopHandler};
pub use state::{ConnectionId, ConnectionPhase};
pub use transport::{channel_transport, ChannelSink, ChannelSource, FrameSink, FrameSource, Peer};
pub use websocket::{WsSink, WsSource};
