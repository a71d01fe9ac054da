//! Aura Server - request/reply front end for aura-core
//!
//! A visualizer client sends JSON commands over a ZeroMQ REQ socket and gets
//! exactly one JSON reply per command. See [`protocol`] for the message
//! shapes and [`dispatcher`] for the serving loop.

pub mod dispatcher;
pub mod protocol;
pub mod transport;

pub use dispatcher::{Control, Dispatcher, RequestHandler, ServeOutcome};
pub use protocol::{ProtocolError, Request, Response};
pub use transport::{ChannelClient, ChannelTransport, Transport, TransportError, ZmqTransport};
