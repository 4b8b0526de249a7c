use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::util::env::env_parse;

/// Linear-backoff retry policy shared by both store primitives.
///
/// Attempt `n` that fails waits `n * delay` before attempt `n + 1`. The policy
/// does not classify errors; any error is retried until attempts run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Returned when every attempt failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl RetryPolicy {
    /// Reads `STORE_MAX_RETRIES` / `STORE_RETRY_DELAY_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_parse("STORE_MAX_RETRIES", defaults.max_attempts),
            delay: Duration::from_millis(env_parse(
                "STORE_RETRY_DELAY_MS",
                defaults.delay.as_millis() as u64,
            )),
        }
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }

    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "store operation recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(operation, attempt, max_attempts, error = %e, "store operation failed");
                    if attempt >= max_attempts {
                        return Err(Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    sleep(self.backoff_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
