//! Async driver running sign-in attempts over a [`Connector`].
//!
//! The driver owns the event loop; the [`ConnectionSession`] owns all state.
//! Each awaited transport event is handed to exactly one session transition
//! before the next one is awaited.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::ResponsePacket;
use crate::protocol::session::{ConnectionSession, ConnectionState, Credentials};
use crate::protocol::sink::StatusSink;
use crate::transport::{Connector, Link, TransportEvent};
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::timeout::with_connect_timeout;

/// Drives sign-in attempts over connections opened by `K`, reporting to `S`.
///
/// One attempt runs at a time; a new [`login`](Self::login) drops whatever
/// link the previous attempt left behind.
pub struct LoginClient<K: Connector, S: StatusSink> {
    connector: K,
    session: ConnectionSession<K::Conn, S>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    server_url: String,
}

impl<K: Connector, S: StatusSink> LoginClient<K, S> {
    /// Build a client in the `Disconnected` state.
    pub fn new(connector: K, config: &ClientConfig, sink: S) -> Self {
        Self {
            connector,
            session: ConnectionSession::new(config, sink),
            events: None,
            server_url: config.server_url.clone(),
        }
    }

    /// Share `metrics` with the session.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.session = self.session.with_metrics(metrics);
        self
    }

    /// The underlying state machine.
    pub fn session(&self) -> &ConnectionSession<K::Conn, S> {
        &self.session
    }

    /// Current session state.
    pub fn state(&self) -> &ConnectionState {
        self.session.state()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.session.metrics()
    }

    /// Sign in against the configured server URL.
    pub async fn login_default(
        &mut self,
        user_id: u64,
        device_id: u64,
        token: &str,
    ) -> Result<ResponsePacket> {
        let server_url = self.server_url.clone();
        self.login(&server_url, user_id, device_id, token).await
    }

    /// Connect, send one sign-in request and wait for its response.
    ///
    /// A nonzero response code is returned as
    /// [`ProtocolError::ApplicationRejected`]; a frame that could not be
    /// decoded surfaces the same way with code `-1`.
    #[instrument(skip(self, token))]
    pub async fn login(
        &mut self,
        server_url: &str,
        user_id: u64,
        device_id: u64,
        token: &str,
    ) -> Result<ResponsePacket> {
        self.events = None;
        let credentials = Credentials::new(server_url, user_id, device_id, token);
        let url = credentials.server_url.clone();
        let attempt = self.session.start_login(credentials)?;

        let opened = {
            let _timer = Timer::start("connect");
            with_connect_timeout(attempt.timeout(), self.connector.connect(&url)).await
        };

        let Link { connection, events } = match opened {
            Ok(link) => link,
            Err(ProtocolError::ConnectTimeout) => {
                self.session.timeout_elapsed(attempt);
                return Err(ProtocolError::ConnectTimeout);
            }
            Err(e) => {
                self.session.connect_failed(attempt, &e.to_string());
                return Err(e);
            }
        };

        if !self.session.transport_opened(attempt, connection) {
            return Err(ProtocolError::InvalidState {
                expected: ConnectionState::Connecting.name().to_string(),
                actual: self.session.state().to_string(),
            });
        }

        self.events = Some(events);
        self.session.send_sign_in()?;
        self.await_response().await
    }

    async fn await_response(&mut self) -> Result<ResponsePacket> {
        let mut events = self.events.take().ok_or(ProtocolError::NotOpen)?;

        loop {
            match events.recv().await {
                Some(TransportEvent::Message(frame)) => {
                    if let Some(packet) = self.session.frame_received(&frame) {
                        self.events = Some(events);
                        return if packet.is_success() {
                            Ok(packet)
                        } else {
                            Err(ProtocolError::ApplicationRejected {
                                code: packet.code,
                                message: packet.message,
                            })
                        };
                    }
                }
                Some(TransportEvent::Error(error)) => {
                    self.session.transport_errored(&error);
                    self.events = Some(events);
                    return Err(ProtocolError::TransportError(error));
                }
                Some(TransportEvent::Closed(reason)) => {
                    self.session.transport_closed(reason.as_deref());
                    return Err(ProtocolError::ConnectionClosed);
                }
                None => {
                    self.session.transport_closed(None);
                    return Err(ProtocolError::ConnectionClosed);
                }
            }
        }
    }

    /// Keep handling transport events until the connection closes.
    pub async fn wait_closed(&mut self) {
        let Some(mut events) = self.events.take() else {
            return;
        };

        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(frame) => {
                    self.session.frame_received(&frame);
                }
                TransportEvent::Error(error) => {
                    self.session.transport_errored(&error);
                }
                TransportEvent::Closed(reason) => {
                    self.session.transport_closed(reason.as_deref());
                    return;
                }
            }
        }

        debug!("Event stream ended without a close event");
        self.session.transport_closed(None);
    }

    /// Close the connection, if any, and return to `Disconnected`.
    pub fn disconnect(&mut self) {
        self.events = None;
        self.session.disconnect();
        self.session.metrics().log_metrics();
    }
}
