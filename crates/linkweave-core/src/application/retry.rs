use std::future::Future;

use crate::application::events::{emit, UploadEvent};
use crate::application::ports::UploadEventHandler;
use crate::config::RetryPolicy;
use crate::error::ClientError;

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
///
/// Between attempts the task sleeps for [`RetryPolicy::delay_for`] and a
/// [`UploadEvent::RetryScheduled`] is emitted. The last error is returned on
/// failure.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    events: &dyn UploadEventHandler,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                emit(
                    events,
                    UploadEvent::RetryScheduled {
                        label: label.to_string(),
                        attempt,
                        max_attempts,
                        delay_ms: delay.as_millis() as u64,
                        error: err.to_string(),
                    },
                )
                .await;
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
