use std::future::Future;
use std::time::Duration;

use crate::error::LearningError;

/// Exponential backoff with optional jitter.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(800),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Used for post-submission work that nobody is waiting on.
    pub fn background() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    fn delay(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) => {
                let jitter_ms = jitter_max.as_millis() as u64;
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::random::<u64>() % (jitter_ms + 1)
                };
                backoff + Duration::from_millis(extra)
            }
            None => backoff,
        }
    }
}

/// Transient failures worth another attempt. Everything else is a decision
/// that will not change on retry.
pub fn is_transient(error: &LearningError) -> bool {
    matches!(
        error,
        LearningError::Persistence(_) | LearningError::Generation(_)
    )
}

/// Retries `f` while it fails with a transient error, up to
/// `config.max_attempts` calls in total.
pub async fn retry_async_with_config<F, Fut, T>(
    config: RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T, LearningError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LearningError>>,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempts_left -= 1;
                if attempts_left == 0 || !is_transient(&e) {
                    return Err(e);
                }
                tracing::debug!(
                    "{} failed ({}), retrying in {:?}; {} attempts left",
                    operation,
                    e,
                    backoff,
                    attempts_left
                );
                tokio::time::sleep(config.delay(backoff)).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
