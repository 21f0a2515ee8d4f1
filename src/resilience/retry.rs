use std::fmt::Display;

use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { attempts: 2, base_delay_ms: 500, max_delay_ms: 3000 }
    }
}

impl From<Option<&RetryConfig>> for RetrySettings {
    fn from(retry: Option<&RetryConfig>) -> Self {
        let defaults = RetrySettings::default();
        Self {
            attempts: retry.and_then(|r| r.attempts).unwrap_or(defaults.attempts).max(1),
            base_delay_ms: retry.and_then(|r| r.base_delay_ms).unwrap_or(defaults.base_delay_ms),
            max_delay_ms: retry.and_then(|r| r.max_delay_ms).unwrap_or(defaults.max_delay_ms),
        }
    }
}

impl RetrySettings {
    /// Runs `operation` until it succeeds, `retryable` rejects the error, or attempts run out.
    pub async fn run_with_retry<F, Fut, T, E, R>(&self, mut operation: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && retryable(&e) => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    sleep(Duration::from_millis(delay)).await;
                    delay = (delay * 2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        error!("all {attempt} attempts failed: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}
