//! Timeout constants and async timeout wrappers.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::{ProtocolError, Result};

/// Default bound on opening a transport connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `fut`, mapping an elapsed timer to [`ProtocolError::ConnectTimeout`].
pub async fn with_connect_timeout<F, T>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::ConnectTimeout),
    }
}
