use std::future::Future;
use std::time::Duration;

use tracing::error;

use fluxgate_core::{AppError, AppResult};

/// Default bound for one repository call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs one repository call under `timeout`, wrapping any fault as a storage
/// failure of `operation`.
pub(crate) async fn bounded_storage_call<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => {
            error!(operation, error = %cause, "rule storage call failed");
            Err(AppError::storage(operation, cause))
        }
        Err(elapsed) => {
            error!(
                operation,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "rule storage call timed out"
            );
            Err(AppError::storage(operation, elapsed))
        }
    }
}
