//! # im-signin
//!
//! A restricted protobuf-style wire codec and the client side of a single
//! sign-in exchange over a persistent message transport.
//!
//! ## Layers
//! - [`core`]: varint / length-delimited / fixed-width primitives and stream framing
//! - [`protocol`]: the `SignInRequest` and `ResponsePacket` schemas, the
//!   connection state machine and the status sink contract
//! - [`transport`]: WebSocket and TCP connectors behind a capability trait
//! - [`service`]: the async [`LoginClient`] driving one attempt end to end
//!
//! ## Example
//! ```no_run
//! use im_signin::config::SigninConfig;
//! use im_signin::protocol::sink::TracingSink;
//! use im_signin::transport::ws::WsConnector;
//! use im_signin::LoginClient;
//!
//! # async fn run() -> im_signin::Result<()> {
//! let config = SigninConfig::from_env()?;
//! config.validate_strict()?;
//! im_signin::utils::logging::init(&config.logging)?;
//!
//! let connector = WsConnector::from_config(&config.transport);
//! let mut client = LoginClient::new(connector, &config.client, TracingSink);
//! let response = client.login_default(1001, 55, "secret").await?;
//! assert_eq!(response.code, 0);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::wire::{Tag, WireType};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::message::{
    decode_response_packet, encode_envelope, encode_sign_in_request, ResponsePacket,
    SignInRequest,
};
pub use crate::protocol::session::{ConnectionSession, ConnectionState, Credentials};
pub use crate::protocol::sink::StatusSink;
pub use crate::service::LoginClient;
