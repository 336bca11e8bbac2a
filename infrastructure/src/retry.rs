use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff: retry `i` sleeps
/// `base_delay * 2^i` before re-running the operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, retry: usize) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry as u32)
    }
}

/// Run `op`, retrying it up to `policy.max_retries` times with backoff.
/// On exhaustion returns the number of retries performed and the last
/// error. Nothing is held across attempts besides the backoff sleep.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, (usize, E)>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_err = match op().await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    for retry in 0..policy.max_retries {
        let delay = policy.delay_for(retry);
        tracing::warn!(retry, ?delay, error = %last_err, "request failed, backing off");
        tokio::time::sleep(delay).await;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => last_err = e,
        }
    }

    Err((policy.max_retries, last_err))
}
