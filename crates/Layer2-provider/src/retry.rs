//! Retry with exponential backoff

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,

    pub initial_delay_ms: u64,

    pub backoff_multiplier: f64,

    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), capped at `max_delay_ms`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    Retry,
    NoRetry,
    /// Honor the vendor's delay when it sent one
    RateLimited { retry_after_ms: Option<u64> },
}

pub trait RetryableError {
    fn classify(&self) -> RetryClassification;
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let delay = match err.classify() {
            RetryClassification::NoRetry => {
                debug!("{}: non-retryable error: {}", operation_name, err);
                return Err(err);
            }
            _ if attempt >= config.max_retries => {
                warn!(
                    "{}: giving up after {} retries: {}",
                    operation_name, config.max_retries, err
                );
                return Err(err);
            }
            RetryClassification::RateLimited {
                retry_after_ms: Some(ms),
            } => Duration::from_millis(ms),
            _ => config.delay_for_attempt(attempt),
        };

        warn!(
            "{}: attempt {} failed, retrying in {:?}: {}",
            operation_name,
            attempt + 1,
            delay,
            err
        );
        sleep(delay).await;
        attempt += 1;
    }
}
