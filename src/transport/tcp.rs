//! TCP transport using varint length-prefixed frames.
//!
//! URLs may be given as `tcp://host:port` or bare `host:port`.

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, warn};

use crate::config::TransportConfig;
use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};
use crate::transport::{strip_scheme, Connector, Link, Outbound, QueuedConnection, TransportEvent};

type FramedTcp = Framed<TcpStream, FrameCodec>;

/// Connector for `tcp://host:port` (or bare `host:port`) URLs.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    codec: FrameCodec,
    queue: usize,
}

impl TcpConnector {
    pub fn new(max_frame_size: usize, queue: usize) -> Self {
        Self {
            codec: FrameCodec::new(max_frame_size),
            queue,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.max_frame_size, config.outbound_queue)
    }

    /// Wrap an already-connected stream.
    pub fn attach(&self, stream: TcpStream) -> Link<QueuedConnection> {
        let (sink, stream) = Framed::new(stream, self.codec).split();
        let (connection, outbound) = QueuedConnection::channel(self.queue);
        let (events_tx, events) = mpsc::channel(self.queue.max(1));

        tokio::spawn(write_loop(sink, outbound, events_tx.clone()));
        tokio::spawn(read_loop(stream, events_tx));

        Link { connection, events }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl Connector for TcpConnector {
    type Conn = QueuedConnection;

    #[instrument(skip(self))]
    async fn connect(&self, url: &str) -> Result<Link<Self::Conn>> {
        let addr = strip_scheme(url, "tcp");
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ProtocolError::ConnectError(e.to_string()))?;
        stream.set_nodelay(true)?;
        debug!(addr, "TCP connection established");
        Ok(self.attach(stream))
    }
}

async fn write_loop(
    mut sink: SplitSink<FramedTcp, Bytes>,
    mut outbound: mpsc::Receiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
) {
    while let Some(command) = outbound.recv().await {
        match command {
            Outbound::Frame(frame) => {
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "TCP write failed");
                    let _ = events.send(TransportEvent::Error(e.to_string())).await;
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(mut stream: SplitStream<FramedTcp>, events: mpsc::Sender<TransportEvent>) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(frame) => {
                if events.send(TransportEvent::Message(frame)).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "TCP read failed");
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        }
    }
    let _ = events.send(TransportEvent::Closed(None)).await;
}
