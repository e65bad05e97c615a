//! # Sign-in Protocol
//!
//! Message schemas and the connection lifecycle built on the wire codec.
//!
//! ## Components
//! - **Message**: `SignInRequest`, `ResponsePacket` and the packet envelope
//! - **Session**: the sans-IO state machine for one sign-in exchange
//! - **Sink**: the notification contract towards the presentation layer

pub mod message;
pub mod session;
pub mod sink;
