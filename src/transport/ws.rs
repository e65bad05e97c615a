//! WebSocket transport. Each binary message is one frame; text messages are
//! logged and dropped.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, warn};

use crate::config::TransportConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::{Connector, Link, Outbound, QueuedConnection, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for `ws://` URLs. `wss://` needs a TLS feature of
/// `tokio-tungstenite` enabled.
#[derive(Debug, Clone)]
pub struct WsConnector {
    max_frame_size: usize,
    queue: usize,
}

impl WsConnector {
    pub fn new(max_frame_size: usize, queue: usize) -> Self {
        Self {
            max_frame_size,
            queue,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.max_frame_size, config.outbound_queue)
    }

    /// Handshake settings; oversized inbound messages are refused while
    /// they are being read rather than after buffering.
    fn ws_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_frame_size);
        config.max_frame_size = Some(self.max_frame_size);
        config
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl Connector for WsConnector {
    type Conn = QueuedConnection;

    #[instrument(skip(self))]
    async fn connect(&self, url: &str) -> Result<Link<Self::Conn>> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ProtocolError::ConnectError(format!(
                "{}: {url}",
                constants::ERR_UNSUPPORTED_SCHEME
            )));
        }

        let (ws, response) = connect_async_with_config(url, Some(self.ws_config()), false)
            .await
            .map_err(|e| ProtocolError::ConnectError(e.to_string()))?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = ws.split();
        let (connection, outbound) = QueuedConnection::channel(self.queue);
        let (events_tx, events) = mpsc::channel(self.queue.max(1));

        tokio::spawn(write_loop(sink, outbound, events_tx.clone()));
        tokio::spawn(read_loop(stream, events_tx));

        Ok(Link { connection, events })
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
) {
    while let Some(command) = outbound.recv().await {
        match command {
            Outbound::Frame(frame) => {
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    warn!(error = %e, "WebSocket write failed");
                    let _ = events.send(TransportEvent::Error(e.to_string())).await;
                    return;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut reason = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(Message::Binary(frame)) => {
                if events.send(TransportEvent::Message(frame)).await.is_err() {
                    return;
                }
            }
            Ok(Message::Text(text)) => {
                debug!(text = text.as_str(), "Ignoring text message");
            }
            Ok(Message::Close(frame)) => {
                reason = frame.map(|f| f.reason.as_str().to_owned());
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "WebSocket read failed");
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        }
    }

    let _ = events.send(TransportEvent::Closed(reason)).await;
}
