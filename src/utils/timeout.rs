use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Grace period for a new connection to authenticate
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on waiting for in-flight writes before closing a socket
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for client-side connect attempts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `fut` with a deadline, mapping expiry to [`ProtocolError::Timeout`]
pub async fn with_timeout_error<F, T>(fut: F, limit: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_maps_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        let result = with_timeout_error(slow, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let failing = async { Err::<(), _>(ProtocolError::ConnectionClosed) };
        let result = with_timeout_error(failing, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }
}
