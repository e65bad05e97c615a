//! Presentation-side notification contract.
//!
//! The session never renders anything itself; it reports connection status
//! changes and the outcome of a login to a [`StatusSink`].

use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receiver of session notifications.
pub trait StatusSink {
    /// The link came up (`connected`) or went away. `message` is a
    /// human-readable reason, never empty.
    fn on_connection_status(&mut self, connected: bool, message: &str);

    /// A login attempt concluded. `code` is the server's response code, or
    /// `-1` when the response could not be decoded.
    fn on_login_result(&mut self, success: bool, code: i32, message: &str);
}

impl<S: StatusSink + ?Sized> StatusSink for Box<S> {
    fn on_connection_status(&mut self, connected: bool, message: &str) {
        (**self).on_connection_status(connected, message)
    }

    fn on_login_result(&mut self, success: bool, code: i32, message: &str) {
        (**self).on_login_result(success, code, message)
    }
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn on_connection_status(&mut self, connected: bool, message: &str) {
        if connected {
            info!(message, "Connected");
        } else {
            warn!(message, "Not connected");
        }
    }

    fn on_login_result(&mut self, success: bool, code: i32, message: &str) {
        if success {
            info!(code, message, "Login succeeded");
        } else {
            warn!(code, message, "Login failed");
        }
    }
}

/// Notification forwarded by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectionStatus { connected: bool, message: String },
    LoginResult { success: bool, code: i32, message: String },
}

/// Sink forwarding every notification over an unbounded channel.
///
/// Notifications are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn on_connection_status(&mut self, connected: bool, message: &str) {
        let _ = self.tx.send(SessionEvent::ConnectionStatus {
            connected,
            message: message.to_string(),
        });
    }

    fn on_login_result(&mut self, success: bool, code: i32, message: &str) {
        let _ = self.tx.send(SessionEvent::LoginResult {
            success,
            code,
            message: message.to_string(),
        });
    }
}
