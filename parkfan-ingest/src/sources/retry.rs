//! Exponential backoff for transient upstream failures
//!
//! Only `UpstreamUnavailable` is retried. Rejections (4xx), quota blocks and
//! parse errors return on the first attempt.

use crate::config::SourceSettings;
use crate::error::SourceError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt count and first delay; the delay doubles on each retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl From<&SourceSettings> for RetryPolicy {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: settings.initial_backoff(),
        }
    }
}

/// Run `op`, retrying transient failures with exponential backoff
pub async fn with_backoff<F, Fut, T>(
    source_id: &str,
    operation: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(source = source_id, operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                warn!(
                    source = source_id,
                    operation,
                    attempt,
                    backoff_ms = delay.as_millis(),
                    error = %err,
                    "Transient upstream failure, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(
                        source = source_id,
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Upstream still unavailable, retries exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}
