use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::AppError;

/// Attempts per background write before it is given up.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;
const BACKOFF_STEP_MS: u64 = 200;

/// Runs `op` until it succeeds or `MAX_WRITE_ATTEMPTS` is reached, with linear backoff.
/// Returns the last error when every attempt failed. Not-found and validation errors are
/// returned at once; repeating the call cannot change them.
pub async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_transient(&e) => return Err(e),
            Err(e) if attempt < MAX_WRITE_ATTEMPTS => {
                let delay = Duration::from_millis(BACKOFF_STEP_MS * u64::from(attempt));
                warn!(
                    "{label} failed (attempt {attempt}/{MAX_WRITE_ATTEMPTS}): {e}; retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(error: &AppError) -> bool {
    !matches!(error, AppError::NotFound(_) | AppError::Validation(_))
}
