//! Timeout defaults and async timeout wrappers.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Default timeout for establishing a connection
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long an accepted connection may stay unauthenticated
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Maximum token age accepted by the receive path
pub const TOKEN_FRESHNESS: Duration = Duration::from_secs(30);

/// How long a stopping server waits for connections to drain
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a fallible future, mapping expiry to `ProtocolError::Timeout`.
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}
