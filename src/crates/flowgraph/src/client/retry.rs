//! Retry logic with exponential backoff
//!
//! Used by tool clients to absorb transient transport failures before an
//! error reaches the node executor. The walker itself never retries.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: usize,

    /// Delay before the first retry (in milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff (e.g., 2.0 for doubling)
    pub multiplier: f64,

    /// Scale each delay by a random factor in 0.5..=1.5
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration without jitter
    pub fn new(max_retries: usize, initial_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
            max_delay_ms,
            multiplier,
            jitter: false,
        }
    }

    /// Disable retries entirely
    pub fn none() -> Self {
        Self::new(0, 0, 0, 1.0)
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate delay for a given retry number (0-indexed)
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = (self.initial_delay_ms as f64) * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64).max(0.0);

        let final_delay = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            capped * factor
        } else {
            capped
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Execute an operation, retrying failures that `is_retryable` accepts
///
/// # Arguments
/// * `config` - Retry configuration
/// * `label` - Identifier for logging (e.g. `server/tool`)
/// * `is_retryable` - Decides whether an error is transient
/// * `operation` - Async function to execute
///
/// # Returns
/// The first success, the first permanent error, or the last error once
/// retries are exhausted
pub async fn with_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    label: &str,
    is_retryable: P,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(label = %label, attempt = attempt, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(e) if attempt < config.max_retries && is_retryable(&e) => {
                let delay = config.calculate_delay(attempt);
                attempt += 1;
                warn!(
                    label = %label,
                    attempt = attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, will retry"
                );
                sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        label = %label,
                        attempts = attempt + 1,
                        error = %e,
                        "Operation failed, giving up"
                    );
                }
                return Err(e);
            }
        }
    }
}
