//! Connection lifecycle for a single sign-in exchange.
//!
//! [`ConnectionSession`] performs no I/O and never awaits. Each transport
//! callback maps to one transition method, which runs to completion before the
//! next event is handled:
//!
//! ```text
//! Disconnected --start_login--> Connecting --transport_opened--> Connected
//! Connecting --timeout_elapsed | connect_failed--> Failed
//! Connected --send_sign_in--> AwaitingResponse --frame_received--> Connected | Failed
//! any --transport_closed | disconnect--> Disconnected
//! ```
//!
//! The connect timer is owned by the session. It is identified by the
//! [`ConnectAttempt`] returned from `start_login`; an open, failure or timeout
//! carrying a stale attempt is ignored, so a late open can never follow a
//! timeout and a late timeout can never follow an open.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{
    decode_response_packet, encode_envelope, ResponsePacket, SignInRequest,
};
use crate::protocol::sink::StatusSink;
use crate::transport::Connection;
use crate::utils::metrics::Metrics;
use crate::utils::time::unix_millis;

/// Why the last attempt ended in [`ConnectionState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    ConnectTimeout,
    ConnectError(String),
    Transport(String),
    /// The peer answered with a nonzero code (`-1` for an unparseable frame).
    Rejected { code: i32 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ConnectTimeout => f.write_str(constants::MSG_CONNECT_TIMEOUT),
            FailureReason::ConnectError(e) => {
                write!(f, "{}: {e}", constants::MSG_CONNECTION_FAILED)
            }
            FailureReason::Transport(e) => write!(f, "transport error: {e}"),
            FailureReason::Rejected { code } => {
                write!(f, "{}: code {code}", constants::MSG_LOGIN_REJECTED)
            }
        }
    }
}

/// Where the session is in the connect / sign-in lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// A sign-in request is on the wire and no response has arrived yet.
    AwaitingResponse,
    Failed(FailureReason),
}

impl ConnectionState {
    /// Lowercase name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::AwaitingResponse => "awaiting_response",
            ConnectionState::Failed(_) => "failed",
        }
    }

    /// Whether a transport connection is (or is about to be) held.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::AwaitingResponse
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Input to [`ConnectionSession::start_login`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub server_url: String,
    pub user_id: u64,
    pub device_id: u64,
    pub token: String,
}

impl Credentials {
    pub fn new(
        server_url: impl Into<String>,
        user_id: u64,
        device_id: u64,
        token: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into().trim().to_string(),
            user_id,
            device_id,
            token: token.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing = if self.server_url.is_empty() {
            "server url"
        } else if self.user_id == 0 {
            "user id"
        } else if self.device_id == 0 {
            "device id"
        } else if self.token.is_empty() {
            "token"
        } else {
            return Ok(());
        };
        Err(ProtocolError::InvalidCredentials(format!("missing {missing}")))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Who the connection is signed in as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: u64,
    pub device_id: u64,
}

/// Handle for the connect timer armed by [`ConnectionSession::start_login`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAttempt {
    id: u64,
    timeout: Duration,
}

impl ConnectAttempt {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// How long the driver should wait for the transport to open.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Sign-in state machine owning one transport connection.
pub struct ConnectionSession<C: Connection, S: StatusSink> {
    state: ConnectionState,
    connection: Option<C>,
    sink: S,
    timer: Option<ConnectAttempt>,
    attempts: u64,
    pending: Option<Credentials>,
    in_flight: Option<SessionIdentity>,
    identity: Option<SessionIdentity>,
    request_id: Option<u64>,
    connect_timeout: Duration,
    wrap_in_envelope: bool,
    sign_in_command: u32,
    metrics: Arc<Metrics>,
}

impl<C: Connection, S: StatusSink> ConnectionSession<C, S> {
    /// A disconnected session reporting to `sink`.
    pub fn new(config: &ClientConfig, sink: S) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            connection: None,
            sink,
            timer: None,
            attempts: 0,
            pending: None,
            in_flight: None,
            identity: None,
            request_id: None,
            connect_timeout: config.connect_timeout,
            wrap_in_envelope: config.wrap_in_envelope,
            sign_in_command: config.sign_in_command,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.identity
    }

    /// Request id of the last sign-in envelope sent, if any.
    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    /// The armed connect timer, if any.
    pub fn connect_timer(&self) -> Option<ConnectAttempt> {
        self.timer
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Begin a login attempt: drop any held connection, enter `Connecting`
    /// and arm the connect timer.
    pub fn start_login(&mut self, credentials: Credentials) -> Result<ConnectAttempt> {
        if let Err(e) = credentials.validate() {
            warn!(error = %e, "Rejecting login request");
            self.sink
                .on_connection_status(false, constants::MSG_INCOMPLETE_CREDENTIALS);
            return Err(e);
        }

        self.release_connection();
        self.attempts += 1;
        let attempt = ConnectAttempt {
            id: self.attempts,
            timeout: self.connect_timeout,
        };

        info!(
            attempt = attempt.id,
            url = %credentials.server_url,
            user_id = credentials.user_id,
            device_id = credentials.device_id,
            timeout_ms = attempt.timeout.as_millis() as u64,
            "Connecting"
        );

        self.timer = Some(attempt);
        self.pending = Some(credentials);
        self.in_flight = None;
        self.identity = None;
        self.request_id = None;
        self.state = ConnectionState::Connecting;
        self.metrics.connect_attempt();

        Ok(attempt)
    }

    /// The transport opened. Returns `false` (and closes `connection`) when
    /// the attempt is no longer the one being waited for.
    pub fn transport_opened(&mut self, attempt: ConnectAttempt, mut connection: C) -> bool {
        if !self.is_current(attempt) {
            warn!(attempt = attempt.id, state = %self.state, "Ignoring late transport open");
            connection.close();
            return false;
        }

        self.timer = None;
        self.connection = Some(connection);
        self.state = ConnectionState::Connected;
        info!(attempt = attempt.id, "Transport connected");
        self.sink.on_connection_status(true, constants::MSG_CONNECTED);
        true
    }

    /// The connect timer fired. Ignored unless `attempt` is still pending.
    pub fn timeout_elapsed(&mut self, attempt: ConnectAttempt) -> bool {
        if !self.is_current(attempt) {
            debug!(attempt = attempt.id, "Ignoring stale connect timeout");
            return false;
        }

        self.metrics.connect_timed_out();
        self.fail(FailureReason::ConnectTimeout);
        true
    }

    /// Opening the transport failed. Ignored unless `attempt` is still pending.
    pub fn connect_failed(&mut self, attempt: ConnectAttempt, error: &str) -> bool {
        if !self.is_current(attempt) {
            debug!(attempt = attempt.id, error, "Ignoring stale connect failure");
            return false;
        }

        self.metrics.connect_failed();
        self.fail(FailureReason::ConnectError(error.to_string()));
        true
    }

    /// The open transport reported an error.
    pub fn transport_errored(&mut self, error: &str) -> bool {
        match self.state {
            ConnectionState::Connecting => {
                self.metrics.connect_failed();
                self.fail(FailureReason::ConnectError(error.to_string()));
                true
            }
            ConnectionState::Connected | ConnectionState::AwaitingResponse => {
                self.fail(FailureReason::Transport(error.to_string()));
                true
            }
            _ => {
                debug!(error, state = %self.state, "Ignoring transport error");
                false
            }
        }
    }

    /// Build the sign-in request and write it to the transport.
    ///
    /// Only valid in `Connected` with an attempt that has not sent yet.
    /// Returns the frame that was written.
    pub fn send_sign_in(&mut self) -> Result<Bytes> {
        if self.state != ConnectionState::Connected {
            return Err(ProtocolError::NotOpen);
        }
        let credentials = self.pending.take().ok_or_else(|| ProtocolError::InvalidState {
            expected: "pending login attempt".to_string(),
            actual: self.state.to_string(),
        })?;
        let connection = self.connection.as_mut().ok_or(ProtocolError::NotOpen)?;

        let request = SignInRequest::new(
            credentials.user_id,
            credentials.device_id,
            credentials.token.as_str(),
        );
        let payload = request.encode();

        let (frame, request_id) = if self.wrap_in_envelope {
            let request_id = unix_millis();
            (
                encode_envelope(self.sign_in_command, request_id, 0, "", Some(&payload[..])),
                Some(request_id),
            )
        } else {
            (payload, None)
        };

        if let Err(e) = connection.send(frame.clone()) {
            warn!(error = %e, "Failed to write sign-in request");
            self.fail(FailureReason::Transport(e.to_string()));
            return Err(e);
        }

        debug!(
            user_id = credentials.user_id,
            device_id = credentials.device_id,
            request_id,
            len = frame.len(),
            hex = %hex::encode(&frame),
            "Sign-in request sent"
        );

        self.metrics.frame_sent(frame.len() as u64);
        self.request_id = request_id;
        self.in_flight = Some(SessionIdentity {
            user_id: credentials.user_id,
            device_id: credentials.device_id,
        });
        self.state = ConnectionState::AwaitingResponse;
        Ok(frame)
    }

    /// Handle one inbound frame. Returns the decoded packet when it
    /// concluded the pending exchange, `None` when it was ignored.
    pub fn frame_received(&mut self, frame: &[u8]) -> Option<ResponsePacket> {
        self.metrics.frame_received(frame.len() as u64);
        debug!(len = frame.len(), hex = %hex::encode(frame), "Frame received");

        if self.state != ConnectionState::AwaitingResponse {
            warn!(state = %self.state, len = frame.len(), "Ignoring unsolicited frame");
            return None;
        }

        let packet = decode_response_packet(frame);
        if packet.is_parse_error() {
            self.metrics.decode_fault();
        }

        let identity = self.in_flight.take();
        if packet.is_success() {
            self.identity = identity;
            self.state = ConnectionState::Connected;
            self.metrics.login_accepted();
            info!(request_id = packet.request_id, "Login accepted");

            let message = non_empty_or(&packet.message, constants::MSG_LOGIN_ACCEPTED);
            self.sink.on_login_result(true, 0, message);
        } else {
            self.release_connection();
            self.state = ConnectionState::Failed(FailureReason::Rejected { code: packet.code });
            self.metrics.login_rejected();
            warn!(code = packet.code, message = %packet.message, "Login rejected");

            let message = non_empty_or(&packet.message, constants::MSG_LOGIN_REJECTED);
            self.sink.on_login_result(false, packet.code, message);
        }

        Some(packet)
    }

    /// The transport closed. Always lands in `Disconnected`; repeated calls
    /// are no-ops. Returns whether the state changed.
    pub fn transport_closed(&mut self, reason: Option<&str>) -> bool {
        self.connection = None;
        let previous = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        self.clear_attempt();
        self.identity = None;

        if previous.is_active() {
            info!(reason, previous = %previous, "Transport closed");
            let message = reason
                .filter(|r| !r.is_empty())
                .unwrap_or(constants::MSG_CONNECTION_CLOSED);
            self.sink.on_connection_status(false, message);
        }

        previous != ConnectionState::Disconnected
    }

    /// Caller-initiated shutdown: close the transport if open and return to
    /// `Disconnected`.
    pub fn disconnect(&mut self) {
        self.release_connection();
        self.clear_attempt();
        self.identity = None;
        self.state = ConnectionState::Disconnected;
        info!("Disconnected by caller");
        self.sink.on_connection_status(false, constants::MSG_DISCONNECTED);
    }

    fn is_current(&self, attempt: ConnectAttempt) -> bool {
        self.state == ConnectionState::Connecting && self.timer == Some(attempt)
    }

    fn fail(&mut self, reason: FailureReason) {
        self.release_connection();
        self.clear_attempt();
        warn!(reason = %reason, "Session failed");
        let message = reason.to_string();
        self.state = ConnectionState::Failed(reason);
        self.sink.on_connection_status(false, &message);
    }

    /// Null out the held connection before closing it.
    fn release_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }

    fn clear_attempt(&mut self) {
        self.timer = None;
        self.pending = None;
        self.in_flight = None;
    }
}

impl<C: Connection, S: StatusSink> fmt::Debug for ConnectionSession<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("state", &self.state)
            .field("has_connection", &self.connection.is_some())
            .field("timer", &self.timer)
            .field("identity", &self.identity)
            .field("request_id", &self.request_id)
            .finish()
    }
}

fn non_empty_or<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.is_empty() {
        fallback
    } else {
        message
    }
}
