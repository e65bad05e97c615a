//! # Transport Layer
//!
//! Message-oriented transports the sign-in session runs over.
//!
//! A transport is injected into the session as a capability:
//! - [`Connector::connect`] opens a connection and yields a [`Link`]
//! - [`Connection::send`] queues one outbound frame without blocking
//! - [`Connection::close`] is idempotent
//! - inbound traffic arrives on [`Link::events`] as [`TransportEvent`]s
//!
//! ## Implementations
//! - **WebSocket** ([`ws::WsConnector`]): one binary message per frame
//! - **TCP** ([`tcp::TcpConnector`]): varint length-prefixed frames via
//!   [`FrameCodec`](crate::core::codec::FrameCodec)
//!
//! Both spawn a reader task and a writer task per connection; the writer is
//! fed through a bounded queue so `send` never awaits.

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::error::{constants, ProtocolError, Result};

pub mod tcp;
pub mod ws;

/// Something that happened on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete inbound frame.
    Message(Bytes),
    /// The peer or the transport closed the connection.
    Closed(Option<String>),
    /// The transport failed; a `Closed` event follows.
    Error(String),
}

/// Write half of an open connection.
pub trait Connection {
    /// Queue one frame for delivery.
    fn send(&mut self, frame: Bytes) -> Result<()>;

    /// Close the connection. Calling this more than once is harmless.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// An open connection plus the stream of its inbound events.
#[derive(Debug)]
pub struct Link<C> {
    pub connection: C,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens connections to a URL.
pub trait Connector {
    type Conn: Connection;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Link<Self::Conn>>> + Send;
}

/// Command for a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    Frame(Bytes),
    Close,
}

/// [`Connection`] backed by a writer task fed through a bounded queue.
#[derive(Debug)]
pub struct QueuedConnection {
    tx: Option<mpsc::Sender<Outbound>>,
}

impl QueuedConnection {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Connection plus the receiving end for its writer task.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl Connection for QueuedConnection {
    fn send(&mut self, frame: Bytes) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(ProtocolError::NotOpen)?;
        tx.try_send(Outbound::Frame(frame)).map_err(|e| match e {
            TrySendError::Full(_) => {
                ProtocolError::TransportError("outbound queue full".to_string())
            }
            TrySendError::Closed(_) => {
                ProtocolError::TransportError(constants::ERR_WRITER_GONE.to_string())
            }
        })
    }

    fn close(&mut self) {
        if let Some(tx) = self.tx.take() {
            debug!("Closing queued connection");
            let _ = tx.try_send(Outbound::Close);
        }
    }

    fn is_open(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl Drop for QueuedConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Strip `scheme://` from `url` if it matches, otherwise return `url` unchanged.
pub(crate) fn strip_scheme<'a>(url: &'a str, scheme: &str) -> &'a str {
    url.strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix("://"))
        .unwrap_or(url)
}
