use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::TransportError;

/// Errors that may carry an HTTP status worth retrying on.
pub trait HttpStatusError: std::fmt::Display {
    fn http_status(&self) -> Option<u16>;
}

impl HttpStatusError for TransportError {
    fn http_status(&self) -> Option<u16> {
        self.status()
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub backoff: Duration,
    pub retryable_statuses: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::server_not_ready()
    }
}

impl RetryPolicy {
    /// goosed answers 428 until its agent is configured: wait 2s, retry once.
    pub fn server_not_ready() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(2),
            retryable_statuses: BTreeSet::from([428]),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn should_retry<E: HttpStatusError>(&self, attempt: u32, error: &E) -> bool {
        attempt < self.max_attempts
            && error
                .http_status()
                .map(|status| self.retryable_statuses.contains(&status))
                .unwrap_or(false)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts. Attempts are numbered from 1.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: HttpStatusError,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Succeeded on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Err(e) if self.should_retry(attempt, &e) => {
                    warn!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, self.max_attempts, e, self.backoff
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_428_once_after_backoff() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<&str, TransportError> = RetryPolicy::server_not_ready()
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        Err(TransportError::http_status(428, "agent not ready"))
                    } else {
                        Ok("added")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "added");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TransportError> = RetryPolicy::server_not_ready()
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::http_status(428, "still not ready")) }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(428));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_statuses_fail_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TransportError> = RetryPolicy::server_not_ready()
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::http_status(500, "boom")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_should_retry_within_attempts() {
        let err = TransportError::http_status(428, "not ready");
        assert!(RetryPolicy::server_not_ready().should_retry(1, &err));
        assert!(!RetryPolicy::server_not_ready().should_retry(2, &err));
    }
}
