//! # Error Types
//!
//! Error handling for the wire codec, the sign-in session and its transports.
//!
//! ## Error Categories
//! - **Codec Errors**: malformed varints, truncated buffers, unsupported wire types.
//!   These never escape [`decode_response_packet`](crate::protocol::message::decode_response_packet);
//!   they are folded into the sentinel packet instead.
//! - **Session Errors**: connect failures and timeouts, writes outside an open
//!   connection, invalid login input.
//! - **Application Errors**: the peer answered with a nonzero `code`.
//! - **Configuration Errors**: invalid or unreadable configuration.
//!
//! ## Example Usage
//! ```rust
//! use im_signin::core::wire::decode_varint;
//! use im_signin::error::ProtocolError;
//!
//! match decode_varint(&[0x80, 0x80], 0) {
//!     Err(ProtocolError::MalformedVarint) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Sink / status messages
    pub const MSG_CONNECTED: &str = "connection established";
    pub const MSG_CONNECTION_CLOSED: &str = "connection closed";
    pub const MSG_CONNECTION_FAILED: &str = "connection failed";
    pub const MSG_CONNECT_TIMEOUT: &str = "connection timed out";
    pub const MSG_DISCONNECTED: &str = "disconnected";
    pub const MSG_LOGIN_ACCEPTED: &str = "login succeeded";
    pub const MSG_LOGIN_REJECTED: &str = "login failed";
    pub const MSG_INCOMPLETE_CREDENTIALS: &str = "incomplete login information";

    /// Sentinel packet message for unparseable frames
    pub const MSG_PARSE_ERROR: &str = "parse error";

    /// Transport errors
    pub const ERR_NOT_OPEN: &str = "Connection is not open";
    pub const ERR_WRITER_GONE: &str = "Transport writer task has stopped";
    pub const ERR_UNSUPPORTED_SCHEME: &str = "Unsupported URL scheme";
}

/// Primary error type for all codec, session and transport operations.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Malformed varint")]
    MalformedVarint,

    #[error("Truncated buffer: needed {needed} bytes, {available} available")]
    TruncatedBuffer { needed: usize, available: usize },

    #[error("Unsupported wire type: {0}")]
    UnsupportedWireType(u8),

    #[error("Invalid field tag: {0}")]
    InvalidTag(u64),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Connect error: {0}")]
    ConnectError(String),

    #[error("Connect timed out")]
    ConnectTimeout,

    #[error("{}", constants::ERR_NOT_OPEN)]
    NotOpen,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Login rejected with code {code}: {message}")]
    ApplicationRejected { code: i32, message: String },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid session state: expected {expected}, was {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Whether re-running the login flow can succeed without operator action.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ProtocolError::ConfigError(_))
    }

    /// Whether this is a codec-level fault (absorbed into the sentinel packet).
    pub fn is_codec_fault(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedVarint
                | ProtocolError::TruncatedBuffer { .. }
                | ProtocolError::UnsupportedWireType(_)
                | ProtocolError::InvalidTag(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_faults_are_classified() {
        assert!(ProtocolError::MalformedVarint.is_codec_fault());
        assert!(ProtocolError::InvalidTag(0).is_codec_fault());
        assert!(!ProtocolError::ConnectTimeout.is_codec_fault());
    }

    #[test]
    fn not_open_uses_shared_message() {
        assert_eq!(ProtocolError::NotOpen.to_string(), constants::ERR_NOT_OPEN);
    }

    #[test]
    fn only_config_errors_are_unrecoverable() {
        assert!(ProtocolError::ConnectTimeout.is_recoverable());
        assert!(ProtocolError::ApplicationRejected {
            code: 5,
            message: String::new()
        }
        .is_recoverable());
        assert!(!ProtocolError::ConfigError("bad".into()).is_recoverable());
    }
}
