//! Bounded exponential backoff for index-service calls.

use std::future::Future;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{RagError, Result};

/// How a single attempt failed.
#[derive(Debug)]
pub(crate) enum Failure {
    /// Network error, timeout, 429 or 5xx. Worth another attempt.
    Transient(String),
    /// The request itself is wrong; retrying cannot help.
    Permanent(RagError),
}

/// Run `attempt` until it succeeds, fails permanently, or the policy's
/// attempt budget is spent.
///
/// Exhausting the budget yields [`RagError::ServiceUnavailable`] carrying
/// the last transient failure.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Failure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut made = 0;
    loop {
        made += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(Failure::Permanent(e)) => return Err(e),
            Err(Failure::Transient(message)) if made >= max_attempts => {
                warn!(operation, attempts = made, error = %message, "giving up on index service");
                return Err(RagError::ServiceUnavailable {
                    operation: operation.to_string(),
                    attempts: made,
                    message,
                });
            }
            Err(Failure::Transient(message)) => {
                let delay = policy.backoff(made);
                warn!(
                    operation,
                    attempt = made,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "transient index service failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
