//! # Utility Modules
//!
//! Supporting utilities for logging, timing and observability.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: atomic counters for connection and login activity
//! - **Time**: wall-clock timestamps used as request ids
//! - **Timeout**: connect timeout constant and async wrapper

pub mod logging;
pub mod metrics;
pub mod time;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
