//! Rate-limited caller: bounds in-flight backend calls and retries
//! rate-limit signals with exponential backoff.
//!
//! Contract per prompt:
//! - a semaphore permit is held for the duration of each attempt, released
//!   during backoff sleeps so other tasks can proceed;
//! - rate-limit errors retry up to `retry_attempts` times with backoff
//!   doubling from `initial_backoff_secs` and capped at `max_backoff_secs`;
//!   after the last attempt the rate-limit error propagates;
//! - any other backend error is a soft failure: logged, `Ok(None)` returned;
//! - success returns the completion text verbatim.

use crate::client::ChatBackend;
use crate::models::{LimitsConfig, QagenError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub struct RateLimitedCaller {
    backend: Arc<dyn ChatBackend>,
    semaphore: Arc<Semaphore>,
    retry_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RateLimitedCaller {
    pub fn new(backend: Arc<dyn ChatBackend>, limits: &LimitsConfig) -> Self {
        Self {
            backend,
            semaphore: Arc::new(Semaphore::new(limits.max_concurrent.max(1))),
            retry_attempts: limits.retry_attempts.max(1),
            initial_backoff: Duration::from_secs(limits.initial_backoff_secs),
            max_backoff: Duration::from_secs(limits.max_backoff_secs),
        }
    }

    /// Issue one prompt under the concurrency cap.
    pub async fn call(&self, prompt: &str) -> Result<Option<String>> {
        let mut backoff = self.initial_backoff;

        for attempt in 0..self.retry_attempts {
            let result = {
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|_| QagenError::Internal("Semaphore closed".to_string()))?;
                self.backend.complete(prompt).await
            };

            match result {
                Ok(content) => return Ok(Some(content)),
                Err(e) if e.is_rate_limit() => {
                    if attempt + 1 >= self.retry_attempts {
                        warn!(
                            attempts = self.retry_attempts,
                            "Rate limit retries exhausted"
                        );
                        return Err(e);
                    }
                    debug!(
                        attempt = attempt,
                        backoff_secs = backoff.as_secs(),
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(e) => {
                    warn!(error = %e, "Backend error, dropping round");
                    return Ok(None);
                }
            }
        }

        // Loop always returns within retry_attempts iterations.
        Err(QagenError::Internal("Retry loop fell through".to_string()))
    }
}
