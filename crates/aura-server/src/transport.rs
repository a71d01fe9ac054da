//! Request/reply transports
//!
//! The dispatcher only needs "wait a bounded time for one request" and
//! "send one reply". [`ZmqTransport`] serves remote clients over a ZeroMQ
//! REP socket; [`ChannelTransport`] runs the same loop in-process.

use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

/// Transport failure (fatal for the serving loop)
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: zmq::Error,
    },

    #[error("Socket error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("Peer disconnected")]
    Disconnected,
}

/// One request in, one reply out
pub trait Transport {
    /// Wait for the next request; `Ok(None)` when the poll interval elapsed
    fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Reply to the request last received
    fn send(&mut self, reply: &[u8]) -> Result<(), TransportError>;
}

/// ZeroMQ REP socket
pub struct ZmqTransport {
    // Declared before the context so it is closed first
    socket: zmq::Socket,
    _context: zmq::Context,
    endpoint: String,
}

impl ZmqTransport {
    /// Bind a REP socket at `endpoint` (e.g. `tcp://*:5555`)
    pub fn bind(endpoint: &str, poll_interval: Duration) -> Result<Self, TransportError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::REP)?;
        let timeout_ms = i32::try_from(poll_interval.as_millis()).unwrap_or(i32::MAX);
        socket.set_rcvtimeo(timeout_ms)?;
        socket.set_linger(0)?;
        socket.bind(endpoint).map_err(|source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;

        // Resolves a wildcard port such as `tcp://127.0.0.1:*`
        let endpoint = match socket.get_last_endpoint() {
            Ok(Ok(bound)) => bound,
            _ => endpoint.to_string(),
        };

        log::info!("Listening on {}", endpoint);
        Ok(Self {
            socket,
            _context: context,
            endpoint,
        })
    }

    /// Endpoint the socket is bound to, with the actual port
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for ZmqTransport {
    fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.socket.recv_bytes(0) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(zmq::Error::EAGAIN) | Err(zmq::Error::EINTR) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, reply: &[u8]) -> Result<(), TransportError> {
        self.socket.send(reply, 0)?;
        Ok(())
    }
}

impl Drop for ZmqTransport {
    fn drop(&mut self) {
        log::info!("Closing socket {}", self.endpoint);
    }
}

/// In-process transport over crossbeam channels
pub struct ChannelTransport {
    requests: Receiver<Vec<u8>>,
    replies: Sender<Vec<u8>>,
    poll_interval: Duration,
}

/// Client end of a [`ChannelTransport`]
#[derive(Clone)]
pub struct ChannelClient {
    requests: Sender<Vec<u8>>,
    replies: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Connected transport/client pair
    pub fn pair(poll_interval: Duration) -> (ChannelTransport, ChannelClient) {
        let (request_tx, request_rx) = channel::unbounded();
        let (reply_tx, reply_rx) = channel::unbounded();
        (
            ChannelTransport {
                requests: request_rx,
                replies: reply_tx,
                poll_interval,
            },
            ChannelClient {
                requests: request_tx,
                replies: reply_rx,
            },
        )
    }
}

impl Transport for ChannelTransport {
    fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.requests.recv_timeout(self.poll_interval) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }

    fn send(&mut self, reply: &[u8]) -> Result<(), TransportError> {
        self.replies
            .send(reply.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }
}

impl ChannelClient {
    /// Send a request and block for its reply
    pub fn request(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.requests
            .send(payload.to_vec())
            .map_err(|_| TransportError::Disconnected)?;
        self.replies.recv().map_err(|_| TransportError::Disconnected)
    }
}
