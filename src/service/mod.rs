//! # Services
//!
//! Async drivers that connect the sans-IO session to real transports.

pub mod client;

pub use client::LoginClient;
